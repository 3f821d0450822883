#![no_main]
use libfuzzer_sys::fuzz_target;
use pdkind_engine::generalize::eq_to_ineq;
use pdkind_smt::backends::smtlib_parser::parse_term;
use pdkind_smt::sorts::SmtSort;
use pdkind_smt::terms::SortEnv;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(term) = parse_term(s) else {
        return;
    };
    let env: SortEnv = term
        .vars()
        .into_iter()
        .map(|name| (name, SmtSort::Real))
        .collect();
    let once = eq_to_ineq(&term, &env);
    assert_eq!(eq_to_ineq(&once, &env), once);
    assert_eq!(once.vars(), term.vars());
});
