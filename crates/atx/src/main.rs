fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = archived_transcript::parse_cli();
    match archived_transcript::run(&cli) {
        Ok(()) => Ok(()),
        Err(err) => {
            let exit_code = archived_transcript::exit_code_for_error(&err);
            archived_transcript::write_cli_error(&err, &mut std::io::stderr())?;
            std::process::exit(exit_code);
        }
    }
}
