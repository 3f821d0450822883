pub mod cvc5_backend;
pub mod partition;
pub mod smtlib_parser;
pub mod smtlib_printer;
pub mod z3_backend;
