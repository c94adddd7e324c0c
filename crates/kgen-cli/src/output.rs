//! Output formatting utilities.

use serde::Serialize;

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Reads a file, or stdin when no path is given.
pub fn read_input(input: Option<&str>) -> Result<String, Box<dyn std::error::Error>> {
    match input {
        Some(path) if path != "-" => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read file {}: {}", path, e).into()),
        _ => {
            let mut buffer = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)?;
            Ok(buffer)
        }
    }
}

/// Parses JSON input, naming the source on failure.
pub fn read_json(input: Option<&str>) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let text = read_input(input)?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid JSON: {}", e).into())
}
