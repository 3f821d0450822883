#![no_main]
use libfuzzer_sys::fuzz_target;
use pdkind_smt::backends::smtlib_parser::{parse_get_value, parse_term};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Solver responses must never make the reader panic.
        if let Ok(term) = parse_term(s) {
            let _ = term.to_string();
        }
        let _ = parse_get_value(s);
    }
});
