use codefort::api::LanguageInfo;
use codefort::{BackendKind, LanguageCatalog, SystemCapabilities, util};
use console::style;
use log::info;
use std::path::Path;

pub fn list_languages(dir: &Path) -> codefort::Result<()> {
    let catalog = LanguageCatalog::load(dir)?;
    info!("Listing {} language(s) from {}", catalog.len(), catalog.root().display());

    println!("Available languages:\n");
    for language in catalog.iter().map(LanguageInfo::from) {
        let kind = if language.compiled { "compiled" } else { "interpreted" };
        println!(
            "  {:14} {} {}",
            style(&language.id).bold(),
            language.name,
            style(format!("({})", kind)).dim()
        );
    }
    println!();
    println!("Use run --language <ID> <FILE> to execute a file");
    Ok(())
}

pub fn check_requirements() {
    info!("Checking sandbox requirements");
    println!("Checking sandbox requirements...\n");

    let caps = SystemCapabilities::detect();
    println!("{}", caps.summary());
    println!();

    for kind in [BackendKind::Landlock, BackendKind::Bubblewrap, BackendKind::Auto] {
        match kind.resolve(&caps) {
            Ok(resolved) => println!(
                "  {:12} {} {}",
                format!("{:?}", kind).to_lowercase(),
                style("usable").green(),
                style(format!("-> {}", resolved)).dim()
            ),
            Err(e) => println!(
                "  {:12} {} {}",
                format!("{:?}", kind).to_lowercase(),
                style("unavailable").red(),
                style(e).dim()
            ),
        }
    }

    println!("\nSystem info:");
    println!("  UID: {}", util::get_uid());
    println!("  GID: {}", util::get_gid());
}
