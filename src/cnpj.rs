use crate::text::digits_only;

const WEIGHTS_FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const WEIGHTS_SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Validates a CNPJ (14-digit corporate tax id) by recomputing its two mod-11
/// check digits. Formatting characters are ignored; repdigit sequences such as
/// "00000000000000" are rejected even though their checksum holds.
pub fn validate_cnpj(cnpj: &str) -> bool {
    let digits = digits_only(cnpj);
    if digits.len() != 14 {
        return false;
    }
    let bytes = digits.as_bytes();
    let first = bytes[0];
    if bytes.iter().all(|&b| b == first) {
        return false;
    }

    let value = |i: usize| (bytes[i] - b'0') as u32;

    let mut sum: u32 = WEIGHTS_FIRST.iter().enumerate().map(|(i, w)| value(i) * w).sum();
    let dv1 = check_digit(sum % 11);

    sum = WEIGHTS_SECOND
        .iter()
        .enumerate()
        .map(|(i, w)| if i < 12 { value(i) * w } else { dv1 * w })
        .sum();
    let dv2 = check_digit(sum % 11);

    value(12) == dv1 && value(13) == dv2
}

fn check_digit(remainder: u32) -> u32 {
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}
