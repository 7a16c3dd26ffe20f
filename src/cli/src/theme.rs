use console::Emoji;
use dialoguer::console::Style;
use dialoguer::theme::ColorfulTheme;
use std::sync::LazyLock;

/// Prompt styling for operator decisions (installs, log cleanup, diagnostics consent).
pub static INTERACTIVE_THEME: LazyLock<ColorfulTheme> = LazyLock::new(|| {
    let marker = Emoji("❓ ", "? ").to_string();
    ColorfulTheme {
        prompt_prefix: Style::new().yellow().apply_to(marker),
        prompt_style: Style::new().bold(),
        prompt_suffix: Style::new().dim().apply_to("›".to_string()),
        success_prefix: Style::new().green().apply_to("✔".to_string()),
        success_suffix: Style::new().dim().apply_to("".to_string()),
        error_prefix: Style::new().red().apply_to("✘".to_string()),
        values_style: Style::new().cyan(),
        ..ColorfulTheme::default()
    }
});
