use super::super::args::*;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Judge(args) => super::judge::run(args).await,
        Command::Analyze(args) => super::analyze::run(args),
        Command::Validate(args) => super::validate::run(args),
    }
}
