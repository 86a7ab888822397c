//! Terminal UI utilities

use colored::Colorize;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print a section header
pub fn header(text: &str) {
    println!("\n{}", text.bold().underline());
}

/// Print a key-value pair
pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Print one product line
pub fn product(product: &iapkit_lib::Product) {
    println!(
        "  {} [{}] {} - {}",
        product.id.as_str().cyan(),
        product.kind,
        product.title,
        product.display_price.green()
    );
}

/// Print one purchase line
pub fn purchase(purchase: &iapkit_lib::Purchase) {
    let ids: Vec<&str> = purchase.product_ids.iter().map(|id| id.as_str()).collect();
    println!(
        "  {} {} ({:?}{})",
        ids.join(",").cyan(),
        purchase.token.as_str().dimmed(),
        purchase.state,
        if purchase.acknowledged { ", acknowledged" } else { "" }
    );
}

/// Print the session status summary
pub fn status(status: &iapkit_lib::SessionStatus) {
    header("Session Status");
    key_value("Connection", &format!("{:?}", status.connection));
    key_value("Loading", &status.is_loading().to_string());
    if let Some(result) = &status.last_result {
        key_value("Last result", &format!("{} ({:?})", result.message, result.severity));
    }
    if let Some(err) = &status.last_error {
        key_value("Last error", &format!("{} [{}]", err.message, err.code as i32));
    }
    for record in &status.history {
        let mark = if record.ok { "✓".green() } else { "✗".red() };
        println!("  {} {:?}: {}", mark, record.operation, record.detail);
    }
}
