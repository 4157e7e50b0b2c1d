//! Brazilian taxpayer identifiers with valid check digits.

const CNPJ_FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CPF_FIRST_WEIGHTS: [u32; 9] = [10, 9, 8, 7, 6, 5, 4, 3, 2];
const CPF_SECOND_WEIGHTS: [u32; 10] = [11, 10, 9, 8, 7, 6, 5, 4, 3, 2];

pub const CNPJ_LENGTH: usize = 14;
pub const CPF_LENGTH: usize = 11;

/// Modulo-11 check digit shared by CNPJ and CPF.
fn check_digit(digits: &[u8], weights: &[u32]) -> u8 {
    let sum: u32 = digits
        .iter()
        .zip(weights)
        .map(|(digit, weight)| u32::from(*digit) * weight)
        .sum();
    match sum % 11 {
        0 | 1 => 0,
        rest => (11 - rest) as u8,
    }
}

fn render(digits: &[u8]) -> String {
    digits.iter().map(|digit| char::from(b'0' + digit)).collect()
}

/// Complete a 12-digit CNPJ base with its two check digits.
pub fn cnpj_from_base(base: [u8; 12]) -> String {
    let mut digits = base.to_vec();
    digits.push(check_digit(&digits, &CNPJ_FIRST_WEIGHTS));
    digits.push(check_digit(&digits, &CNPJ_SECOND_WEIGHTS));
    render(&digits)
}

/// Complete a 9-digit CPF base with its two check digits.
pub fn cpf_from_base(base: [u8; 9]) -> String {
    let mut digits = base.to_vec();
    digits.push(check_digit(&digits, &CPF_FIRST_WEIGHTS));
    digits.push(check_digit(&digits, &CPF_SECOND_WEIGHTS));
    render(&digits)
}

fn digits_of(value: &str, length: usize) -> Option<Vec<u8>> {
    let digits: Vec<u8> = value
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect::<Option<_>>()?;
    (digits.len() == length).then_some(digits)
}

pub fn is_valid_cnpj(value: &str) -> bool {
    digits_of(value, CNPJ_LENGTH).is_some_and(|digits| {
        check_digit(&digits[..12], &CNPJ_FIRST_WEIGHTS) == digits[12]
            && check_digit(&digits[..13], &CNPJ_SECOND_WEIGHTS) == digits[13]
    })
}

pub fn is_valid_cpf(value: &str) -> bool {
    digits_of(value, CPF_LENGTH).is_some_and(|digits| {
        check_digit(&digits[..9], &CPF_FIRST_WEIGHTS) == digits[9]
            && check_digit(&digits[..10], &CPF_SECOND_WEIGHTS) == digits[10]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_documents() {
        assert_eq!(cnpj_from_base([1, 1, 2, 2, 2, 3, 3, 3, 0, 0, 0, 1]), "11222333000181");
        assert_eq!(cpf_from_base([5, 2, 9, 9, 8, 2, 2, 4, 7]), "52998224725");
        assert!(is_valid_cnpj("11222333000181"));
        assert!(!is_valid_cnpj("11222333000182"));
        assert!(is_valid_cpf("52998224725"));
        assert!(!is_valid_cpf("5299822472"));
        assert!(!is_valid_cpf("5299822472X"));
    }
}
