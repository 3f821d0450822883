use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use thiserror::Error;

use crate::backends::partition::Partition;
use crate::backends::smtlib_parser::{
    parse_define_fun_body, parse_get_value, value_from_sexp, SmtLibParseError,
};
use crate::backends::smtlib_printer::{sort_to_smtlib, symbol_to_smtlib, to_smtlib};
use crate::model::Model;
use crate::solver::{FormulaClass, GeneralizeDirection, SatResult, SmtSolver, SolverFeature};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Cvc5Error {
    #[error("cvc5 I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cvc5 not found: {0}")]
    NotFound(String),
    #[error("cvc5 error: {0}")]
    SolverError(String),
    #[error("Failed to parse cvc5 output: {0}")]
    ParseError(#[from] SmtLibParseError),
    #[error("{operation} requires the last check to be {expected}")]
    WrongState {
        operation: &'static str,
        expected: &'static str,
    },
    #[error("pop without a matching push")]
    ScopeUnderflow,
}

const LOGIC: &str = "(set-logic ALL)";
const GLOBAL_DECLARATIONS: &str = "(set-option :global-declarations true)";

/// Out-of-process cvc5 oracle speaking SMT-LIB2 over pipes.
///
/// Every class `B` assertion is guarded by a fresh selector literal and only
/// enabled through `check-sat-assuming`, which keeps it out of the assertion
/// set that `get-interpolant` treats as the A side.
pub struct Cvc5Solver {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
    partition: Partition,
    selectors: Vec<Vec<String>>,
    next_selector: usize,
    last_result: Option<SatResult>,
}

impl Cvc5Solver {
    pub fn new() -> Result<Self, Cvc5Error> {
        Self::with_command_and_timeout("cvc5", None)
    }

    pub fn with_timeout_secs(timeout_secs: u64) -> Result<Self, Cvc5Error> {
        if timeout_secs == 0 {
            return Self::with_command_and_timeout("cvc5", None);
        }
        let timeout_ms = timeout_secs.saturating_mul(1000);
        Self::with_command_and_timeout("cvc5", Some(timeout_ms))
    }

    pub fn with_command(cmd: &str) -> Result<Self, Cvc5Error> {
        Self::with_command_and_timeout(cmd, None)
    }

    pub fn with_command_and_timeout(cmd: &str, timeout_ms: Option<u64>) -> Result<Self, Cvc5Error> {
        let mut args = vec![
            "--lang".to_string(),
            "smt2".to_string(),
            "--incremental".to_string(),
            "--produce-models".to_string(),
            "--produce-interpolants".to_string(),
        ];
        if let Some(ms) = timeout_ms {
            args.push(format!("--tlimit-per={ms}"));
        }

        let mut child = Command::new(cmd)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Cvc5Error::NotFound(format!("{cmd}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("failed to capture cvc5 stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("failed to capture cvc5 stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Cvc5Error::SolverError("failed to capture cvc5 stderr".into()))?;

        let mut solver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr: BufReader::new(stderr),
            partition: Partition::new(),
            selectors: vec![Vec::new()],
            next_selector: 0,
            last_result: None,
        };
        solver.send_command_no_response(GLOBAL_DECLARATIONS)?;
        solver.send_command_no_response(LOGIC)?;
        Ok(solver)
    }

    /// Send a command and read one complete s-expression response, which may
    /// span several lines.
    fn send_command(&mut self, cmd: &str) -> Result<String, Cvc5Error> {
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;

        let mut response = String::new();
        let mut depth: i64 = 0;
        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line)? == 0 {
                let mut stderr = String::new();
                let _ = self.stderr.read_line(&mut stderr);
                return Err(Cvc5Error::SolverError(format!(
                    "No response from cvc5 for command `{cmd}`. stderr: {}",
                    stderr.trim()
                )));
            }
            depth += line.chars().filter(|c| *c == '(').count() as i64;
            depth -= line.chars().filter(|c| *c == ')').count() as i64;
            response.push_str(&line);
            if depth <= 0 && !response.trim().is_empty() {
                break;
            }
        }
        let response = response.trim().to_string();
        if response.starts_with("(error") {
            return Err(Cvc5Error::SolverError(response));
        }
        Ok(response)
    }

    fn send_command_no_response(&mut self, cmd: &str) -> Result<(), Cvc5Error> {
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;
        Ok(())
    }

    fn live_selectors(&self) -> Vec<String> {
        self.selectors.iter().flatten().cloned().collect()
    }

    fn fresh_selector(&mut self) -> Result<String, Cvc5Error> {
        let name = format!("__pdkind_sel_{}", self.next_selector);
        self.next_selector += 1;
        self.send_command_no_response(&format!("(declare-const {name} Bool)"))?;
        if let Some(scope) = self.selectors.last_mut() {
            scope.push(name.clone());
        }
        Ok(name)
    }
}

impl Drop for Cvc5Solver {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}

fn parse_check_response(response: &str) -> Result<SatResult, Cvc5Error> {
    match response {
        "sat" => Ok(SatResult::Sat),
        "unsat" => Ok(SatResult::Unsat),
        "unknown" => Ok(SatResult::Unknown("cvc5 returned unknown".into())),
        other => Err(Cvc5Error::SolverError(other.to_string())),
    }
}

impl SmtSolver for Cvc5Solver {
    type Error = Cvc5Error;

    fn declare_var(
        &mut self,
        name: &str,
        sort: &SmtSort,
        class: FormulaClass,
    ) -> Result<(), Cvc5Error> {
        if self.partition.sort_of(name).is_none() {
            let symbol = symbol_to_smtlib(name);
            let sort_str = sort_to_smtlib(sort);
            self.send_command_no_response(&format!("(declare-const {symbol} {sort_str})"))?;
        }
        self.partition.declare(name, *sort, class);
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm, class: FormulaClass) -> Result<(), Cvc5Error> {
        let smt_str = to_smtlib(term);
        match class {
            FormulaClass::B => {
                let selector = self.fresh_selector()?;
                self.send_command_no_response(&format!("(assert (=> {selector} {smt_str}))"))?;
            }
            FormulaClass::A | FormulaClass::T => {
                self.send_command_no_response(&format!("(assert {smt_str})"))?;
            }
        }
        self.partition.record(term, class);
        self.last_result = None;
        Ok(())
    }

    fn push(&mut self) -> Result<(), Cvc5Error> {
        self.send_command_no_response("(push 1)")?;
        self.partition.push();
        self.selectors.push(Vec::new());
        self.last_result = None;
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Cvc5Error> {
        if !self.partition.pop() {
            return Err(Cvc5Error::ScopeUnderflow);
        }
        self.selectors.pop();
        self.send_command_no_response("(pop 1)")?;
        self.last_result = None;
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Cvc5Error> {
        let payload = self.live_selectors().join(" ");
        let response = self.send_command(&format!("(check-sat-assuming ({payload}))"))?;
        let result = parse_check_response(&response)?;
        self.last_result = Some(result.clone());
        Ok(result)
    }

    fn get_model(&mut self) -> Result<Model, Cvc5Error> {
        if self.last_result != Some(SatResult::Sat) {
            return Err(Cvc5Error::WrongState {
                operation: "get_model",
                expected: "sat",
            });
        }
        let declared: Vec<(String, SmtSort)> = self
            .partition
            .declared()
            .map(|(name, sort)| (name.to_string(), sort))
            .collect();
        let mut model = Model::new();
        if declared.is_empty() {
            return Ok(model);
        }
        let symbols: Vec<String> = declared
            .iter()
            .map(|(name, _)| symbol_to_smtlib(name))
            .collect();
        let response = self.send_command(&format!("(get-value ({}))", symbols.join(" ")))?;
        for ((name, sort), (_, value)) in declared.iter().zip(parse_get_value(&response)?) {
            model.insert(name.clone(), value_from_sexp(&value, sort)?);
        }
        Ok(model)
    }

    fn generalize(
        &mut self,
        direction: GeneralizeDirection,
        model: Option<&Model>,
    ) -> Result<Vec<SmtTerm>, Cvc5Error> {
        match model {
            Some(model) => Ok(self.partition.model_cube(direction, model)),
            None => {
                let model = self.get_model()?;
                Ok(self.partition.model_cube(direction, &model))
            }
        }
    }

    fn interpolate(&mut self) -> Result<SmtTerm, Cvc5Error> {
        if self.last_result != Some(SatResult::Unsat) {
            return Err(Cvc5Error::WrongState {
                operation: "interpolate",
                expected: "unsat",
            });
        }
        let b_side = SmtTerm::mk_and(self.partition.assertions(|c| c == FormulaClass::B));
        let conjecture = to_smtlib(&b_side.mk_not());
        let response = self.send_command(&format!("(get-interpolant __pdkind_itp {conjecture})"))?;
        Ok(parse_define_fun_body(&response)?)
    }

    fn supports(&self, feature: SolverFeature) -> bool {
        match feature {
            SolverFeature::Interpolation | SolverFeature::Generalization => true,
        }
    }

    fn gc(&mut self) -> Result<(), Cvc5Error> {
        self.last_result = None;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Cvc5Error> {
        self.send_command_no_response("(reset)")?;
        self.send_command_no_response(GLOBAL_DECLARATIONS)?;
        self.send_command_no_response(LOGIC)?;
        self.partition.clear();
        self.selectors = vec![Vec::new()];
        self.next_selector = 0;
        self.last_result = None;
        Ok(())
    }
}
