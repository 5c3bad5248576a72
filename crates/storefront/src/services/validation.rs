//! Form validation.
//!
//! Regex checks for the fields shoppers type in. Every failure is a
//! [`ValidationError`] whose message is safe to show to the user.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use greencart_core::Email;

use crate::models::address::AddressInput;
use crate::models::product::{NewProduct, ProductData};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}][\p{L} .'\-]{1,49}$").expect("Invalid regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("Invalid regex")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("Invalid regex"));

static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 \-]{1,8}[A-Za-z0-9]$").expect("Invalid regex"));

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (argon2 input bound).
const MAX_PASSWORD_LENGTH: usize = 128;

/// Longest free-text address field.
const MAX_ADDRESS_FIELD_LENGTH: usize = 120;

/// Number of images a product may carry.
pub const MAX_PRODUCT_IMAGES: usize = 4;

/// A user-facing validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name must be 2-50 letters")]
    Name,
    #[error("Please enter a valid email")]
    Email,
    #[error("Password must be at least 8 characters and include uppercase, lowercase and a number")]
    WeakPassword,
    #[error("Please enter a valid phone number")]
    Phone,
    #[error("Please enter a valid zip code")]
    Zipcode,
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{0} is too long")]
    TooLong(&'static str),
    #[error("{0}")]
    Invalid(String),
}

/// Validate a display name, returning it trimmed.
///
/// # Errors
///
/// Returns `ValidationError::Name` unless the name is 2-50 letters, spaces, `.`, `'` or `-`.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if NAME_RE.is_match(name) && name.chars().count() <= 50 {
        Ok(name.to_string())
    } else {
        Err(ValidationError::Name)
    }
}

/// Validate and normalize an email.
///
/// # Errors
///
/// Returns `ValidationError::Email` if the address is malformed.
pub fn validate_email(email: &str) -> Result<Email, ValidationError> {
    let email = Email::parse(email).map_err(|_| ValidationError::Email)?;
    if EMAIL_RE.is_match(email.as_str()) {
        Ok(email)
    } else {
        Err(ValidationError::Email)
    }
}

/// Validate password strength.
///
/// # Errors
///
/// Returns `ValidationError::WeakPassword` unless the password has 8-128
/// characters with a lowercase letter, an uppercase letter and a digit.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    let strong = (MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit());

    if strong {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword)
    }
}

/// Validate a phone number, ignoring spaces, dashes, dots and parentheses.
///
/// # Errors
///
/// Returns `ValidationError::Phone` unless 7-15 digits remain (optionally `+`-prefixed).
pub fn validate_phone(phone: &str) -> Result<String, ValidationError> {
    let compact: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if PHONE_RE.is_match(&compact) {
        Ok(compact)
    } else {
        Err(ValidationError::Phone)
    }
}

/// Validate a postal code.
///
/// # Errors
///
/// Returns `ValidationError::Zipcode` unless it is 3-10 letters, digits, spaces or dashes.
pub fn validate_zipcode(zipcode: &str) -> Result<String, ValidationError> {
    let zipcode = zipcode.trim();
    if ZIP_RE.is_match(zipcode) {
        Ok(zipcode.to_uppercase())
    } else {
        Err(ValidationError::Zipcode)
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required(field));
    }
    if value.chars().count() > MAX_ADDRESS_FIELD_LENGTH {
        return Err(ValidationError::TooLong(field));
    }
    Ok(value.to_string())
}

/// Validate an address, returning a trimmed and normalized copy.
///
/// # Errors
///
/// Returns the first failing field's `ValidationError`.
pub fn validate_address(input: &AddressInput) -> Result<AddressInput, ValidationError> {
    Ok(AddressInput {
        first_name: required(&input.first_name, "First name")?,
        last_name: required(&input.last_name, "Last name")?,
        email: validate_email(&input.email)?.into_inner(),
        street: required(&input.street, "Street")?,
        city: required(&input.city, "City")?,
        state: required(&input.state, "State")?,
        zipcode: validate_zipcode(&input.zipcode)?,
        country: required(&input.country, "Country")?,
        phone: validate_phone(&input.phone)?,
    })
}

/// Check the text and price fields of the add-product form.
///
/// Runs before images are uploaded so a bad form never leaves files on the CDN.
///
/// # Errors
///
/// Returns `ValidationError` for missing text, negative prices or an offer
/// price above the price.
pub fn check_product_data(data: &ProductData) -> Result<(), ValidationError> {
    required(&data.name, "Product name")?;
    required(&data.category, "Category")?;

    if data.price.is_sign_negative() || data.offer_price.is_sign_negative() {
        return Err(ValidationError::Invalid(
            "Prices cannot be negative".to_string(),
        ));
    }
    if data.offer_price > data.price {
        return Err(ValidationError::Invalid(
            "Offer price cannot exceed price".to_string(),
        ));
    }
    Ok(())
}

/// Validate the add-product form and attach the uploaded image URLs.
///
/// # Errors
///
/// Returns `ValidationError` for anything `check_product_data` rejects or an
/// image count outside 1-4.
pub fn validate_product(
    data: ProductData,
    images: Vec<String>,
) -> Result<NewProduct, ValidationError> {
    check_product_data(&data)?;
    validate_image_count(images.len())?;

    Ok(NewProduct {
        name: required(&data.name, "Product name")?,
        category: required(&data.category, "Category")?,
        description: data.description.into_lines(),
        price: data.price.round_dp(2),
        offer_price: data.offer_price.round_dp(2),
        images,
    })
}

pub fn validate_image_count(count: usize) -> Result<(), ValidationError> {
    if count == 0 {
        return Err(ValidationError::Invalid(
            "At least one image is required".to_string(),
        ));
    }
    if count > MAX_PRODUCT_IMAGES {
        return Err(ValidationError::Invalid(format!(
            "At most {MAX_PRODUCT_IMAGES} images are allowed"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::product::Description;
    use rust_decimal::Decimal;

    fn address() -> AddressInput {
        AddressInput {
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            email: "Ada@Example.com".to_string(),
            street: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            state: "Greater London".to_string(),
            zipcode: "sw1a 1aa".to_string(),
            country: "UK".to_string(),
            phone: "+44 20-7946-0958".to_string(),
        }
    }

    fn product_data() -> ProductData {
        ProductData {
            name: "Apple".to_string(),
            description: Description::Lines(vec!["Crisp".to_string()]),
            category: "Fruits".to_string(),
            price: Decimal::new(500, 2),
            offer_price: Decimal::new(450, 2),
        }
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Ada Lovelace ").unwrap(), "Ada Lovelace");
        assert!(validate_name("O'Brien-Smith").is_ok());
        assert!(validate_name("José").is_ok());
        assert_eq!(validate_name("A"), Err(ValidationError::Name));
        assert_eq!(validate_name("R2D2"), Err(ValidationError::Name));
        assert_eq!(validate_name(&"a".repeat(51)), Err(ValidationError::Name));
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(
            validate_email(" User@Example.COM ").unwrap().as_str(),
            "user@example.com"
        );
        assert_eq!(validate_email("user@example.c"), Err(ValidationError::Email));
        assert_eq!(validate_email("not-an-email"), Err(ValidationError::Email));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Greener42").is_ok());
        assert_eq!(validate_password("short1A"), Err(ValidationError::WeakPassword));
        assert_eq!(validate_password("alllowercase1"), Err(ValidationError::WeakPassword));
        assert_eq!(validate_password("ALLUPPERCASE1"), Err(ValidationError::WeakPassword));
        assert_eq!(validate_password("NoDigitsHere"), Err(ValidationError::WeakPassword));
    }

    #[test]
    fn test_validate_phone() {
        assert_eq!(validate_phone("+1 (555) 123-4567").unwrap(), "+15551234567");
        assert_eq!(validate_phone("12345"), Err(ValidationError::Phone));
        assert_eq!(validate_phone("phone"), Err(ValidationError::Phone));
    }

    #[test]
    fn test_validate_zipcode() {
        assert_eq!(validate_zipcode("10001").unwrap(), "10001");
        assert_eq!(validate_zipcode("k1a 0b1").unwrap(), "K1A 0B1");
        assert_eq!(validate_zipcode("12"), Err(ValidationError::Zipcode));
        assert_eq!(validate_zipcode("12345678901"), Err(ValidationError::Zipcode));
    }

    #[test]
    fn test_validate_address_normalizes() {
        let validated = validate_address(&address()).unwrap();
        assert_eq!(validated.first_name, "Ada");
        assert_eq!(validated.email, "ada@example.com");
        assert_eq!(validated.zipcode, "SW1A 1AA");
        assert_eq!(validated.phone, "+442079460958");
    }

    #[test]
    fn test_validate_address_reports_missing_field() {
        let mut input = address();
        input.city = "   ".to_string();
        assert_eq!(
            validate_address(&input),
            Err(ValidationError::Required("City"))
        );
    }

    #[test]
    fn test_validate_product() {
        let product =
            validate_product(product_data(), vec!["https://img/1.png".to_string()]).unwrap();
        assert_eq!(product.name, "Apple");
        assert_eq!(product.images.len(), 1);

        let mut data = product_data();
        data.offer_price = Decimal::new(600, 2);
        assert!(validate_product(data, vec!["u".to_string()]).is_err());

        assert!(validate_product(product_data(), Vec::new()).is_err());
        assert!(validate_product(product_data(), vec!["u".to_string(); 5]).is_err());
    }
}
