use super::EXIT_SUCCESS;
use clap::CommandFactory;
use std::path::Path;

pub fn run<C: CommandFactory>(dir: &Path) -> Result<u8, String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("failed to create dir: {e}"))?;
    let cmd = C::command();
    let bin = cmd.get_name().to_owned();
    render_page(
        clap_mangen::Man::new(cmd.clone()).title(bin.to_uppercase()),
        &dir.join(format!("{bin}.1")),
    )?;
    for sub in cmd.get_subcommands().filter(|sub| !sub.is_hide_set()) {
        let page = format!("{bin}-{}", sub.get_name());
        render_page(
            clap_mangen::Man::new(sub.clone()).title(page.to_uppercase()),
            &dir.join(format!("{page}.1")),
        )?;
    }
    println!("man pages written to {}", dir.display());
    Ok(EXIT_SUCCESS)
}

fn render_page(man: clap_mangen::Man, path: &Path) -> Result<(), String> {
    let mut buf = Vec::new();
    man.render(&mut buf)
        .map_err(|e| format!("man page render failed: {e}"))?;
    std::fs::write(path, &buf).map_err(|e| format!("failed to write {}: {e}", path.display()))
}
