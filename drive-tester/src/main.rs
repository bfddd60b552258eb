fn main() -> anyhow::Result<()> {
    let code = drive_tester::run()?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
