use std::process::ExitCode;

pub fn main() -> ExitCode {
    puffin_directed::cli::main()
}
