use crate::utils::error::{AppError, AppResult};

pub const CODE_LENGTH: usize = 6;

// Uppercase letters and digits, minus the easily confused 0/O and 1/I.
const CODE_ALPHABET: [char; 32] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T',
    'U', 'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8', '9',
];

pub fn generate_code() -> String {
    nanoid::nanoid!(CODE_LENGTH, &CODE_ALPHABET)
}

/// Normalises user input and checks the invitation code format.
pub fn normalize_code(raw: &str) -> AppResult<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() != CODE_LENGTH || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::ValidationError(format!(
            "Invalid invitation code '{}': expected {} letters or digits",
            raw.trim(),
            CODE_LENGTH
        )));
    }
    Ok(code)
}
