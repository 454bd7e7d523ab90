//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::{Style, Term};
use kiln_ops::{
    FetchReport, InstallReport, InstalledRecipe, IntegrityReport, OperationResult, PlanReport,
    RecipeInfo, UninstallReport,
};
use kiln_types::{ColorChoice, PlanEntryAction};
use std::io;

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
    /// Color configuration
    color_choice: ColorChoice,
    /// Terminal instance
    term: Term,
}

impl OutputRenderer {
    /// Create new output renderer
    pub fn new(json_output: bool, color_choice: ColorChoice) -> Self {
        Self {
            json_output,
            color_choice,
            term: Term::stdout(),
        }
    }

    /// Render operation result
    pub fn render_result(&self, result: &OperationResult) -> io::Result<()> {
        if self.json_output {
            self.render_json(result)
        } else {
            self.render_table(result)
        }
    }

    /// Render as JSON
    fn render_json(&self, result: &OperationResult) -> io::Result<()> {
        let json = result.to_json().map_err(io::Error::other)?;
        self.term.write_line(&json)
    }

    /// Render as formatted table
    fn render_table(&self, result: &OperationResult) -> io::Result<()> {
        match result {
            OperationResult::InstallReport(report) => self.render_install_report(report),
            OperationResult::UninstallReport(report) => self.render_uninstall_report(report),
            OperationResult::PlanReport(report) => self.render_plan(report),
            OperationResult::FetchReport(report) => self.render_fetch_report(report),
            OperationResult::RecipeList(recipes) => self.render_recipe_list(recipes),
            OperationResult::RecipeInfo(info) => self.render_recipe_info(info),
            OperationResult::IntegrityReport(report) => self.render_integrity_report(report),
        }
    }

    fn render_install_report(&self, report: &InstallReport) -> io::Result<()> {
        if report.installed.is_empty() {
            if report.already_installed.is_empty() {
                println!("Nothing to install.");
            } else {
                println!(
                    "Already installed: {}",
                    report.already_installed.join(", ")
                );
            }
            return Ok(());
        }

        println!("Installation Summary");
        println!();

        let mut table = self.table(&["Recipe", "Version", "Phase", "Artifacts", "Skipped"]);
        for change in &report.installed {
            let version = match &change.from_version {
                Some(from) if from != &change.version => format!("{from} → {}", change.version),
                _ => change.version.clone(),
            };
            table.add_row(vec![
                Cell::new(self.style_name(&change.name)),
                Cell::new(version),
                Cell::new(change.phase.to_string()),
                Cell::new(change.artifacts),
                Cell::new(change.skipped),
            ]);
        }
        println!("{table}");

        if !report.already_installed.is_empty() {
            println!(
                "Already installed: {}",
                report.already_installed.join(", ")
            );
        }
        if !report.satisfied.is_empty() {
            println!("Provided by host: {}", report.satisfied.join(", "));
        }
        if !report.removed_build_dependencies.is_empty() {
            println!(
                "Removed build dependencies: {}",
                report.removed_build_dependencies.join(", ")
            );
        }

        println!();
        println!("Root:     {}", report.install_root.display());
        println!("Completed in {}ms", report.duration_ms);
        if let Some(id) = report.transaction_id {
            println!("Transaction: {id}");
        }
        Ok(())
    }

    fn render_uninstall_report(&self, report: &UninstallReport) -> io::Result<()> {
        println!(
            "Uninstalled {} {} ({} entries removed)",
            self.style_name(&report.name),
            report.version,
            report.removed.len()
        );
        if !report.modified.is_empty() {
            println!();
            println!("Modified since install:");
            for path in &report.modified {
                println!("  • {}", path.display());
            }
        }
        Ok(())
    }

    fn render_plan(&self, report: &PlanReport) -> io::Result<()> {
        println!(
            "Plan for {} {}",
            self.style_name(&report.recipe),
            report.version
        );
        println!();

        let mut table = self.table(&["#", "Recipe", "Version", "Phase", "Action", "Reason"]);
        for (index, step) in report.steps.iter().enumerate() {
            let action = match step.action {
                PlanEntryAction::Install => Cell::new("install").fg(Color::Cyan),
                PlanEntryAction::Satisfied => Cell::new("satisfied").fg(Color::Green),
            };
            table.add_row(vec![
                Cell::new(index + 1),
                Cell::new(&step.name),
                Cell::new(step.version.as_deref().unwrap_or("-")),
                Cell::new(step.phase.to_string()),
                action,
                Cell::new(&step.reason),
            ]);
        }
        println!("{table}");
        Ok(())
    }

    fn render_fetch_report(&self, report: &FetchReport) -> io::Result<()> {
        println!(
            "Fetched {} {}",
            self.style_name(&report.recipe),
            report.version
        );
        println!();
        println!("Source:   {}", report.uri);
        println!("Digest:   {}", report.digest);
        println!("Size:     {}", format_size(report.size));
        if let Some(path) = &report.path {
            println!("Saved to: {}", path.display());
        }
        Ok(())
    }

    fn render_recipe_list(&self, recipes: &[InstalledRecipe]) -> io::Result<()> {
        if recipes.is_empty() {
            println!("No recipes installed.");
            return Ok(());
        }

        let mut table = self.table(&["Recipe", "Version", "Entries", "Installed", "Depends on"]);
        for recipe in recipes {
            let depends = if recipe.runtime_dependencies.is_empty() {
                "-".to_string()
            } else {
                recipe.runtime_dependencies.join(", ")
            };
            table.add_row(vec![
                Cell::new(self.style_name(&recipe.name)),
                Cell::new(&recipe.version),
                Cell::new(recipe.entries),
                Cell::new(recipe.installed_at.format("%Y-%m-%d %H:%M").to_string()),
                Cell::new(depends),
            ]);
        }
        println!("{table}");
        Ok(())
    }

    fn render_recipe_info(&self, info: &RecipeInfo) -> io::Result<()> {
        let summary = &info.summary;
        println!("{}", self.style_name(&summary.name));
        println!();
        println!("Version:     {}", summary.version);
        if let Some(license) = &summary.license {
            println!("License:     {license}");
        }
        println!("Source:      {}", info.source_url);
        if let Some(digest) = &info.source_digest {
            println!("Digest:      {digest}");
        }
        println!("Root:        {}", info.install_root.display());
        println!(
            "Installed:   {}",
            summary.installed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        print_list("Runtime dependencies", &summary.runtime_dependencies);
        print_list("Build dependencies", &summary.build_dependencies);
        print_list("Required by", &info.dependents);

        if !info.artifacts.is_empty() {
            println!();
            let mut table = self.table(&["Destination", "Category", "Kind", "Checksum"]);
            for artifact in &info.artifacts {
                table.add_row(vec![
                    Cell::new(artifact.destination.display()),
                    Cell::new(&artifact.category),
                    Cell::new(&artifact.kind),
                    Cell::new(short_checksum(&artifact.checksum)),
                ]);
            }
            println!("{table}");
        }
        Ok(())
    }

    fn render_integrity_report(&self, report: &IntegrityReport) -> io::Result<()> {
        let status = if report.is_intact() {
            self.paint("intact", &Style::new().green().bold())
        } else {
            self.paint("damaged", &Style::new().red().bold())
        };
        println!(
            "{} {}: {status} ({} entries)",
            self.style_name(&report.name),
            report.version,
            report.entries
        );

        for path in &report.missing {
            println!("  missing:  {}", path.display());
        }
        for path in &report.modified {
            println!("  modified: {}", path.display());
        }
        Ok(())
    }

    fn table(&self, headers: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if !self.supports_color() {
            table.force_no_tty();
        }
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
        table
    }

    /// Style recipe name
    fn style_name(&self, name: &str) -> String {
        self.paint(name, &Style::new().bold())
    }

    fn paint(&self, text: &str, style: &Style) -> String {
        if self.supports_color() {
            style.clone().force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Check if color output is supported
    fn supports_color(&self) -> bool {
        match self.color_choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.term.features().colors_supported(),
        }
    }
}

fn print_list(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("{label}:");
    for item in items {
        println!("  • {item}");
    }
}

/// First 16 hex digits, keeping any algorithm prefix
fn short_checksum(checksum: &str) -> String {
    match checksum.split_once(':') {
        Some((algo, hex)) if hex.len() > 16 => format!("{algo}:{}…", &hex[..16]),
        None if checksum.len() > 16 => format!("{}…", &checksum[..16]),
        _ => checksum.to_string(),
    }
}

/// Format byte size in human readable format
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{size:.0} {}", UNITS[unit_index])
    } else {
        format!("{size:.1} {}", UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_short_checksum() {
        assert_eq!(short_checksum(&"ab".repeat(32)), format!("{}…", "ab".repeat(8)));
        let prefixed = format!("sha256:{}", "cd".repeat(32));
        assert_eq!(short_checksum(&prefixed), format!("sha256:{}…", "cd".repeat(8)));
        assert_eq!(short_checksum("-"), "-");
    }

    #[test]
    fn test_never_color_leaves_names_plain() {
        let renderer = OutputRenderer::new(false, ColorChoice::Never);
        assert_eq!(renderer.style_name("o2l"), "o2l");
    }
}
