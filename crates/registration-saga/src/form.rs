//! Registration form and the checks that need no store access.

use crate::error::RegistrationError;
use serde::Deserialize;

/// Label the address picker shows before an address is chosen.
const ADDRESS_PLACEHOLDER: &str = "Address";

/// Values submitted by the registration form.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    /// Region selector (tenant-store connection target)
    pub region_host: String,
    #[serde(rename = "compName")]
    pub company_name: String,
    pub division: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    /// Geocoded address label, e.g. "123 Main St, Springfield, IL, USA"
    pub address: String,
    pub password: String,
    #[serde(alias = "passwordc")]
    pub password_confirm: String,
    pub terms_accepted: bool,
}

impl std::fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("region_host", &self.region_host)
            .field("company_name", &self.company_name)
            .field("division", &self.division)
            .field("name", &self.name)
            .field("phone", &self.phone)
            .field("email", &self.email)
            .field("address", &self.address)
            .field("terms_accepted", &self.terms_accepted)
            .finish_non_exhaustive()
    }
}

/// A resolved postal address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostalAddress {
    pub label: String,
    pub street: String,
    pub city: String,
    pub state: String,
}

impl PostalAddress {
    /// Parse a geocoded label of the form `street, city, state[ zip][, country]`.
    ///
    /// Returns `None` for the picker placeholder or anything not resolved down
    /// to a city and state.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.is_empty() || label == ADDRESS_PLACEHOLDER {
            return None;
        }

        let parts: Vec<&str> = label.split(',').map(str::trim).collect();
        if parts.len() < 3 || parts[..3].iter().any(|p| p.is_empty()) {
            return None;
        }

        let state = parts[2].split_whitespace().next()?.to_string();

        Some(Self {
            label: label.to_string(),
            street: parts[0].to_string(),
            city: parts[1].to_string(),
            state,
        })
    }
}

/// Form values that passed the local checks.
#[derive(Clone)]
pub struct ValidatedForm {
    pub region_selector: String,
    pub company_name: String,
    pub division: String,
    pub name: String,
    pub phone: String,
    /// Trimmed and lowercased
    pub email: String,
    pub address: PostalAddress,
    pub password: String,
    pub password_confirm: String,
}

impl ValidatedForm {
    pub fn passwords_match(&self) -> bool {
        self.password == self.password_confirm
    }
}

impl RegistrationForm {
    /// Run the local preconditions in order: terms, required fields, address.
    ///
    /// Region, uniqueness and password checks follow in the registrar.
    pub fn validate(&self) -> Result<ValidatedForm, RegistrationError> {
        if !self.terms_accepted {
            return Err(RegistrationError::Validation("terms not accepted".into()));
        }

        let required = [
            ("compName", &self.company_name),
            ("division", &self.division),
            ("name", &self.name),
            ("phone", &self.phone),
            ("email", &self.email),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(invalid_field(field));
            }
        }
        if self.password.is_empty() {
            return Err(invalid_field("password"));
        }
        if self.password_confirm.is_empty() {
            return Err(invalid_field("passwordConfirm"));
        }

        let email = self.email.trim().to_lowercase();
        if !is_well_formed_email(&email) {
            return Err(invalid_field("email"));
        }
        if !is_well_formed_phone(&self.phone) {
            return Err(invalid_field("phone"));
        }

        let address = PostalAddress::parse(&self.address)
            .ok_or_else(|| RegistrationError::Validation("invalid address".into()))?;

        Ok(ValidatedForm {
            region_selector: self.region_host.trim().to_string(),
            company_name: self.company_name.trim().to_string(),
            division: self.division.trim().to_string(),
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email,
            address,
            password: self.password.clone(),
            password_confirm: self.password_confirm.clone(),
        })
    }
}

fn invalid_field(field: &str) -> RegistrationError {
    RegistrationError::Validation(format!("missing/invalid field: {}", field))
}

/// `local@domain.tld`, no whitespace.
fn is_well_formed_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Ten digits, or eleven with a leading country code 1.
fn is_well_formed_phone(phone: &str) -> bool {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.len() == 10 || (digits.len() == 11 && digits.starts_with('1'))
}
