use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    aftx_installer::run()
}
