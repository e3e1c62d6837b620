//! Shopper account types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use haat_core::{CategoryId, Email, PhoneNumber, Role, UserId};

use super::clean;

/// Maximum length of a profile bio, in characters.
pub const MAX_BIO_CHARS: usize = 500;

/// A postal address. Country defaults to India.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "India".to_owned()
}

impl Address {
    /// Single-line rendering used for order delivery snapshots.
    #[must_use]
    pub fn one_line(&self) -> String {
        [
            self.street.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.postal_code.as_deref(),
            Some(self.country.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Bank account used for payouts and refunds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub account_number: Option<String>,
    pub ifsc_code: Option<String>,
    pub account_holder_name: Option<String>,
}

/// Payout and payment identifiers attached to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(default)]
    pub bank_account: BankAccount,
    pub upi_id: Option<String>,
    pub razorpay_account_id: Option<String>,
}

/// Notification and browsing preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
}

const fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            categories: Vec::new(),
        }
    }
}

/// A shopper.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub phone_number: PhoneNumber,
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub role: Role,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub preferences: Preferences,
    pub recent_searches: Vec<String>,
    pub addresses: Vec<Address>,
    pub payment_details: PaymentDetails,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Name for delivery snapshots, falling back to the phone number.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if name.trim().is_empty() {
            self.phone_number.to_string()
        } else {
            name
        }
    }

    /// Merge a validated profile update. Absent fields are left alone.
    pub fn apply(&mut self, update: ValidProfileUpdate) {
        if let Some(v) = update.first_name {
            self.first_name = Some(v);
        }
        if let Some(v) = update.last_name {
            self.last_name = Some(v);
        }
        if let Some(v) = update.email {
            self.email = Some(v);
        }
        if let Some(v) = update.date_of_birth {
            self.date_of_birth = Some(v);
        }
        if let Some(v) = update.bio {
            self.bio = Some(v).filter(|b| !b.is_empty());
        }
        if let Some(v) = update.profile_picture {
            self.profile_picture = Some(v);
        }
        if let Some(v) = update.preferences {
            self.preferences = v;
        }
        if let Some(v) = update.recent_searches {
            self.recent_searches = v;
        }
        if let Some(v) = update.addresses {
            self.addresses = v;
        }
        if let Some(v) = update.payment_details {
            self.payment_details = v;
        }
    }
}

/// Validated registration data.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone_number: PhoneNumber,
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Partial profile update sent by the shopper. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub preferences: Option<Preferences>,
    pub recent_searches: Option<Vec<String>>,
    pub addresses: Option<Vec<Address>>,
    pub payment_details: Option<PaymentDetails>,
}

impl ProfileUpdate {
    /// Trim text fields and check length and format limits.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message when the bio is too long or the email
    /// is malformed.
    pub fn validate(mut self) -> Result<ValidProfileUpdate, String> {
        self.first_name = clean(self.first_name);
        self.last_name = clean(self.last_name);
        self.bio = self.bio.map(|b| b.trim().to_owned());
        self.profile_picture = clean(self.profile_picture);

        if let Some(bio) = &self.bio
            && bio.chars().count() > MAX_BIO_CHARS
        {
            return Err(format!("bio must be at most {MAX_BIO_CHARS} characters"));
        }

        let email = clean(self.email)
            .map(|e| Email::parse(&e))
            .transpose()
            .map_err(|e| e.to_string())?;

        Ok(ValidProfileUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            email,
            date_of_birth: self.date_of_birth,
            bio: self.bio,
            profile_picture: self.profile_picture,
            preferences: self.preferences,
            recent_searches: self.recent_searches,
            addresses: self.addresses,
            payment_details: self.payment_details,
        })
    }
}

/// [`ProfileUpdate`] after validation.
#[derive(Debug, Clone, Default)]
pub struct ValidProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<Email>,
    pub date_of_birth: Option<NaiveDate>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub preferences: Option<Preferences>,
    pub recent_searches: Option<Vec<String>>,
    pub addresses: Option<Vec<Address>>,
    pub payment_details: Option<PaymentDetails>,
}

/// Fields an admin may change on a shopper account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserUpdate {
    #[serde(flatten)]
    pub profile: ProfileUpdate,
    pub phone_number: Option<String>,
}
