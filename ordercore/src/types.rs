//! Core domain types for the `OrderCore` catalog/order backend.
//!
//! All types use smart constructors to ensure validity at construction time,
//! following the "parse, don't validate" principle: once a value exists, no
//! further validation is needed anywhere downstream.

use chrono::{DateTime, Utc};
use nutype::nutype;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The version of a persisted record, used for optimistic concurrency control.
///
/// Versions start at 1 when a record is inserted and increment monotonically
/// with every successful write. A guarded write that presents a stale version
/// is rejected by the store as a conflict.
#[nutype(
    validate(greater_or_equal = 1),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct RecordVersion(u64);

impl RecordVersion {
    /// The version assigned to a freshly inserted record.
    pub fn initial() -> Self {
        Self::try_new(1).expect("1 is always a valid version")
    }

    /// Returns the version after this one.
    #[must_use]
    pub fn next(self) -> Self {
        let current: u64 = self.into();
        Self::try_new(current + 1).expect("next version should always be valid")
    }
}

/// A timestamp for when a record was created or updated.
///
/// This wrapper keeps timestamp handling consistent throughout the system
/// and pins the timezone to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a new timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Converts the timestamp into the underlying `DateTime`.
    pub const fn into_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.into_datetime()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Surrogate key of a product category.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct CategoryId(i64);

/// Surrogate key of a catalog product.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct ProductId(i64);

/// Surrogate key of a product image record.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct ImageId(i64);

/// Surrogate key of a product review.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct ReviewId(i64);

/// Surrogate key of a registered user.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct UserId(i64);

/// Surrogate key of an order.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct OrderId(i64);

/// Surrogate key of an order line item.
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct OrderItemId(i64);

/// A quantity of product units within one order line.
///
/// Must be at least 1; a zero-quantity line is a validation error at the
/// boundary, never a representable state.
#[nutype(
    validate(greater_or_equal = 1),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct Quantity(u32);

/// The number of units of a product available in the warehouse.
///
/// Unlike [`Quantity`], zero is a legal stock level (the product is sold
/// out). All arithmetic is checked: a reservation can never drive the level
/// negative, and a restock saturates instead of wrapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StockLevel(u32);

impl StockLevel {
    /// Creates a stock level. Zero is allowed.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw unit count.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether the product is out of stock.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Removes `quantity` units from the level.
    ///
    /// Returns `None` when fewer than `quantity` units are available; the
    /// caller decides how to surface the shortage.
    #[must_use]
    pub fn reserve(self, quantity: Quantity) -> Option<Self> {
        self.0.checked_sub(u32::from(quantity)).map(Self)
    }

    /// Returns `quantity` units to the level, saturating at `u32::MAX`.
    #[must_use]
    pub fn restock(self, quantity: Quantity) -> Self {
        Self(self.0.saturating_add(u32::from(quantity)))
    }
}

impl std::fmt::Display for StockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors produced by [`Money`] smart constructors and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// The amount was negative.
    #[error("money amount cannot be negative: {0}")]
    Negative(Decimal),
    /// The amount carried more than two fractional digits.
    #[error("money amount cannot have more than 2 decimal places: {0}")]
    TooPrecise(Decimal),
    /// The amount exceeded the supported maximum.
    #[error("money amount {0} exceeds maximum {max}", max = Money::MAX_AMOUNT)]
    TooLarge(Decimal),
    /// The input string was not a decimal number.
    #[error("failed to parse money amount: {0}")]
    Unparseable(String),
}

/// A monetary amount with validation.
///
/// Uses `Decimal` for precise financial calculations. Amounts are always
/// non-negative with at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Maximum supported amount (100 million).
    pub const MAX_AMOUNT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

    /// Creates a money value from a decimal amount.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() {
            return Err(MoneyError::Negative(amount));
        }
        if amount.scale() > 2 {
            return Err(MoneyError::TooPrecise(amount));
        }
        if amount > Self::MAX_AMOUNT {
            return Err(MoneyError::TooLarge(amount));
        }
        Ok(Self(amount))
    }

    /// Creates a money value from a whole number of cents.
    pub fn from_cents(cents: u64) -> Result<Self, MoneyError> {
        let decimal = Decimal::new(i64::try_from(cents).unwrap_or(i64::MAX), 2);
        Self::new(decimal)
    }

    /// Rounds an arbitrary decimal to two places and validates it.
    ///
    /// Intended for derived figures such as averages, where division can
    /// introduce extra fractional digits.
    pub fn rounded(amount: Decimal) -> Result<Self, MoneyError> {
        Self::new(amount.round_dp(2))
    }

    /// The zero amount.
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal value.
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Adds two amounts, validating the result.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        Self::new(self.0 + other.0)
    }

    /// Multiplies a unit price by a quantity.
    pub fn times(self, quantity: Quantity) -> Result<Self, MoneyError> {
        Self::new(self.0 * Decimal::from(u32::from(quantity)))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::str::FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = trimmed
            .parse::<Decimal>()
            .map_err(|_| MoneyError::Unparseable(trimmed.to_string()))?;
        Self::new(decimal)
    }
}

/// Name of a product category.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 100),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct CategoryName(String);

/// Name of a catalog product.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 200),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct ProductName(String);

/// Stock keeping unit (SKU).
///
/// Alphanumeric with hyphens and underscores, unique per product.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 50, regex = r"^[A-Za-z0-9_-]+$"),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct Sku(String);

/// Buyer name captured on an order.
#[nutype(
    sanitize(trim),
    validate(len_char_min = 2, len_char_max = 100),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct CustomerName(String);

/// Buyer phone number captured on an order.
#[nutype(
    sanitize(trim),
    validate(len_char_min = 5, len_char_max = 20, regex = r"^[+0-9()\- ]+$"),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct CustomerPhone(String);

/// Delivery address captured on an order.
#[nutype(
    sanitize(trim),
    validate(len_char_min = 10, len_char_max = 500),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct DeliveryAddress(String);

/// Login identifier of a user account (email-shaped).
#[nutype(
    sanitize(trim),
    validate(
        not_empty,
        len_char_max = 255,
        regex = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"
    ),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct Login(String);

/// Display name of a user account.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 100),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct Username(String);

/// Name shown next to a product review.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 100),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct AuthorName(String);

/// Free-text body of a product review.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 1000),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct ReviewComment(String);

/// Star rating of a product review, 1 through 5.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 5),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct Rating(u8);

/// URL of a stored product image.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 500),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct ImageUrl(String);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn record_version_initial_is_one() {
        let initial = RecordVersion::initial();
        let value: u64 = initial.into();
        assert_eq!(value, 1);
    }

    #[test]
    fn record_version_rejects_zero() {
        assert!(RecordVersion::try_new(0).is_err());
    }

    #[test]
    fn ids_reject_non_positive_values() {
        assert!(ProductId::try_new(0).is_err());
        assert!(ProductId::try_new(-5).is_err());
        assert!(OrderId::try_new(1).is_ok());
        assert!(UserId::try_new(i64::MAX).is_ok());
    }

    #[test]
    fn quantity_rejects_zero() {
        assert!(Quantity::try_new(0).is_err());
        assert!(Quantity::try_new(1).is_ok());
    }

    #[test]
    fn stock_level_reserve_rejects_shortage() {
        let stock = StockLevel::new(5);
        let six = Quantity::try_new(6).unwrap();
        assert_eq!(stock.reserve(six), None);

        let five = Quantity::try_new(5).unwrap();
        assert_eq!(stock.reserve(five), Some(StockLevel::new(0)));
    }

    #[test]
    fn stock_level_restock_saturates() {
        let stock = StockLevel::new(u32::MAX - 1);
        let ten = Quantity::try_new(10).unwrap();
        assert_eq!(stock.restock(ten), StockLevel::new(u32::MAX));
    }

    #[test]
    fn money_validation() {
        assert!(Money::new(dec!(10.50)).is_ok());
        assert!(Money::new(dec!(0)).is_ok());
        assert!(Money::new(dec!(-0.01)).is_err());
        assert!(Money::new(dec!(1.001)).is_err());
        assert!(Money::new(dec!(200_000_000)).is_err());
    }

    #[test]
    fn money_times_quantity() {
        let price = Money::new(dec!(100.00)).unwrap();
        let three = Quantity::try_new(3).unwrap();
        assert_eq!(price.times(three).unwrap(), Money::new(dec!(300.00)).unwrap());
    }

    #[test]
    fn money_rounded_truncates_division_noise() {
        let third = dec!(10) / dec!(3);
        let money = Money::rounded(third).unwrap();
        assert_eq!(money.amount(), dec!(3.33));
    }

    #[test]
    fn money_parses_plain_decimal_strings() {
        assert_eq!("10.50".parse::<Money>().unwrap(), Money::new(dec!(10.50)).unwrap());
        assert!("abc".parse::<Money>().is_err());
        assert!("-5.00".parse::<Money>().is_err());
    }

    #[test]
    fn sku_rejects_spaces_and_symbols() {
        assert!(Sku::try_new("LAPTOP-15_B").is_ok());
        assert!(Sku::try_new("LAPTOP 15").is_err());
        assert!(Sku::try_new("").is_err());
        assert!(Sku::try_new("a".repeat(51)).is_err());
    }

    #[test]
    fn customer_phone_accepts_common_formats() {
        assert!(CustomerPhone::try_new("+7 (900) 123-45-67").is_ok());
        assert!(CustomerPhone::try_new("12345").is_ok());
        assert!(CustomerPhone::try_new("123").is_err());
        assert!(CustomerPhone::try_new("phone").is_err());
    }

    #[test]
    fn login_requires_email_shape() {
        assert!(Login::try_new("user@example.com").is_ok());
        assert!(Login::try_new("not-an-email").is_err());
        assert!(Login::try_new("@example.com").is_err());
    }

    #[test]
    fn rating_bounds() {
        assert!(Rating::try_new(0).is_err());
        assert!(Rating::try_new(1).is_ok());
        assert!(Rating::try_new(5).is_ok());
        assert!(Rating::try_new(6).is_err());
    }

    proptest! {
        #[test]
        fn record_version_next_increments_by_one(v in 1u64..u64::MAX) {
            let version = RecordVersion::try_new(v).unwrap();
            let next: u64 = version.next().into();
            prop_assert_eq!(next, v + 1);
        }

        #[test]
        fn money_from_cents_roundtrip(cents in 0u64..1_000_000) {
            let money = Money::from_cents(cents).unwrap();
            prop_assert_eq!(money.amount() * Decimal::from(100), Decimal::from(cents));
        }

        #[test]
        fn stock_reserve_then_restock_is_identity(level in 0u32..1_000_000, units in 1u32..1_000) {
            prop_assume!(units <= level);
            let stock = StockLevel::new(level);
            let quantity = Quantity::try_new(units).unwrap();
            let reserved = stock.reserve(quantity).unwrap();
            prop_assert_eq!(reserved.restock(quantity), stock);
        }

        #[test]
        fn stock_reserve_never_goes_negative(level in 0u32..1_000, units in 1u32..2_000) {
            let stock = StockLevel::new(level);
            let quantity = Quantity::try_new(units).unwrap();
            match stock.reserve(quantity) {
                Some(remaining) => prop_assert_eq!(remaining.value(), level - units),
                None => prop_assert!(units > level),
            }
        }

        #[test]
        fn customer_name_trims_whitespace(s in " {0,5}[a-zA-Z]{2,40} {0,5}") {
            let name = CustomerName::try_new(s.clone()).unwrap();
            prop_assert_eq!(name.as_ref(), s.trim());
        }

        #[test]
        fn money_serialization_roundtrip(cents in 0u64..100_000_000) {
            let money = Money::from_cents(cents).unwrap();
            let json = serde_json::to_string(&money).unwrap();
            let back: Money = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(money, back);
        }
    }
}
