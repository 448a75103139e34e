//! # Chainable Value Wrappers
//!
//! Every secret access produces a wrapper from this module. A wrapper is an
//! immutable value holder carrying the originating key name, an optional
//! synchronously available value, and a future resolving to the value.
//! Validation and transformation operators consume the wrapper and return a
//! new one with both channels updated consistently, so the synchronous and
//! asynchronous views always agree on the outcome for the same underlying
//! value.
//!
//! ## Dual access
//!
//! The async path is the primary one: wrappers implement [`IntoFuture`], so
//! awaiting the expression resolves the secret, runs every attached rule,
//! and yields the typed value. The sync path is explicit: `value()` returns
//! the already-known value or an error naming the key and the remedy when
//! nothing is synchronously available.
//!
//! Validation runs eagerly on the sync channel the moment an operator is
//! applied, and an identical step is attached to the async channel. A rule
//! can never pass on one channel and fail on the other.
//!
//! ## Example
//!
//! ```rust,ignore
//! let token = secrets
//!     .get("API_TOKEN")
//!     .required()
//!     .regex("(?i)^[-a-z0-9]+$", "token must be hyphenated alphanumerics")
//!     .await?;
//!
//! let port = secrets.get("PORT").number().between(1.0, 65535.0).await?;
//! ```

use crate::error::{Result, SecretGateError};
use futures::FutureExt;
use futures::future::BoxFuture;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::future::{Future, IntoFuture};
use std::sync::Arc;

/// Synchronous channel of a wrapper.
enum SyncState<T> {
    /// No value is available without awaiting.
    Missing,
    /// The value is known and has passed every rule so far.
    Ready(T),
    /// A rule or conversion rejected the value (first failure wins).
    Failed(SecretGateError),
}

/// Shared engine behind the public wrapper types.
///
/// Operators consume `self`: the sync channel is evaluated eagerly, and the
/// equivalent step is appended to the boxed future. Errors are constructed
/// per channel through a maker closure because the error type is not `Clone`.
struct Chain<T> {
    key: Arc<str>,
    sync: SyncState<T>,
    fut: BoxFuture<'static, Result<T>>,
}

impl<T: Send + 'static> Chain<T> {
    fn ready(key: &str, value: T) -> Self
    where
        T: Clone,
    {
        let key: Arc<str> = Arc::from(key);
        let async_value = value.clone();
        Chain {
            key,
            sync: SyncState::Ready(value),
            fut: std::future::ready(Ok(async_value)).boxed(),
        }
    }

    fn pending<F>(key: &str, fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Chain {
            key: Arc::from(key),
            sync: SyncState::Missing,
            fut: fut.boxed(),
        }
    }

    fn broken<M>(key: &str, mk_err: M) -> Self
    where
        M: Fn(&str) -> SecretGateError,
    {
        let key: Arc<str> = Arc::from(key);
        let sync_err = mk_err(&key);
        let async_err = mk_err(&key);
        Chain {
            key,
            sync: SyncState::Failed(sync_err),
            fut: std::future::ready(Err(async_err)).boxed(),
        }
    }

    /// Applies a predicate to both channels.
    ///
    /// A present sync value is tested immediately; the async channel tests
    /// the resolved value with the same predicate. Earlier failures pass
    /// through untouched.
    fn check<P, M>(self, pred: P, mk_err: M) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        M: Fn(&str) -> SecretGateError + Send + Sync + 'static,
    {
        let Chain { key, sync, fut } = self;

        let sync = match sync {
            SyncState::Ready(value) => {
                if pred(&value) {
                    SyncState::Ready(value)
                } else {
                    SyncState::Failed(mk_err(&key))
                }
            }
            other => other,
        };

        let async_key = Arc::clone(&key);
        let fut = async move {
            let value = fut.await?;
            if pred(&value) {
                Ok(value)
            } else {
                Err(mk_err(&async_key))
            }
        }
        .boxed();

        Chain { key, sync, fut }
    }

    /// Marks both channels failed, keeping any earlier failure in place.
    fn fail<M>(self, mk_err: M) -> Self
    where
        M: Fn(&str) -> SecretGateError + Send + Sync + 'static,
    {
        let Chain { key, sync, fut } = self;

        let sync = match sync {
            SyncState::Failed(e) => SyncState::Failed(e),
            _ => SyncState::Failed(mk_err(&key)),
        };

        let async_key = Arc::clone(&key);
        let fut = async move {
            let _ = fut.await?;
            Err(mk_err(&async_key))
        }
        .boxed();

        Chain { key, sync, fut }
    }

    /// Applies the same transformation to both channels.
    fn map<U, F>(self, f: F) -> Chain<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let Chain { key, sync, fut } = self;

        let sync = match sync {
            SyncState::Ready(value) => SyncState::Ready(f(value)),
            SyncState::Missing => SyncState::Missing,
            SyncState::Failed(e) => SyncState::Failed(e),
        };

        let fut = fut.map(move |res| res.map(f)).boxed();

        Chain { key, sync, fut }
    }

    /// Parses both channels into a new value type.
    ///
    /// The parse closure reports failures as a message; the engine attaches
    /// the key and the rule name.
    fn convert<U, P>(self, rule: &'static str, parse: P) -> Chain<U>
    where
        U: Send + 'static,
        P: Fn(&T) -> std::result::Result<U, String> + Send + Sync + 'static,
    {
        let Chain { key, sync, fut } = self;

        let sync = match sync {
            SyncState::Ready(value) => match parse(&value) {
                Ok(parsed) => SyncState::Ready(parsed),
                Err(message) => SyncState::Failed(SecretGateError::validation(&key, rule, message)),
            },
            SyncState::Missing => SyncState::Missing,
            SyncState::Failed(e) => SyncState::Failed(e),
        };

        let async_key = Arc::clone(&key);
        let fut = async move {
            let value = fut.await?;
            parse(&value)
                .map_err(|message| SecretGateError::validation(&async_key, rule, message))
        }
        .boxed();

        Chain { key, sync, fut }
    }

    /// Synchronous coercion: the known value, the recorded failure, or the
    /// guidance error when nothing is synchronously available.
    fn into_value(self) -> Result<T> {
        match self.sync {
            SyncState::Ready(value) => Ok(value),
            SyncState::Failed(e) => Err(e),
            SyncState::Missing => Err(SecretGateError::sync_access(&self.key)),
        }
    }
}

/// A string-typed secret value with chainable validation.
///
/// This is the wrapper every access starts from; conversions produce the
/// typed siblings [`SecretNumber`], [`SecretBool`] and [`SecretJson`].
pub struct SecretString {
    chain: Chain<String>,
}

impl SecretString {
    pub(crate) fn ready(key: &str, value: String) -> Self {
        Self {
            chain: Chain::ready(key, value),
        }
    }

    pub(crate) fn pending<F>(key: &str, fut: F) -> Self
    where
        F: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            chain: Chain::pending(key, fut),
        }
    }

    pub(crate) fn broken(key: &str, reason: &str) -> Self {
        let reason = reason.to_string();
        Self {
            chain: Chain::broken(key, move |_| {
                SecretGateError::Initialization(reason.clone())
            }),
        }
    }

    /// The key this wrapper was created for.
    pub fn key(&self) -> &str {
        &self.chain.key
    }

    /// Rejects the empty string.
    ///
    /// Missing secrets resolve to the empty string, so this is the rule
    /// that turns "absent" into a hard error.
    pub fn required(self) -> Self {
        Self {
            chain: self.chain.check(
                |v| !v.is_empty(),
                |key| SecretGateError::validation(key, "required", "value is missing or empty"),
            ),
        }
    }

    /// Rejects values that are empty or whitespace-only.
    pub fn not_empty(self) -> Self {
        Self {
            chain: self.chain.check(
                |v| !v.trim().is_empty(),
                |key| SecretGateError::validation(key, "not_empty", "value is blank"),
            ),
        }
    }

    /// Requires the character count to fall within `[min, max]`, bounds
    /// included.
    pub fn length_between(self, min: usize, max: usize) -> Self {
        let message = format!("length must be between {min} and {max} characters");
        Self {
            chain: self.chain.check(
                move |v| {
                    let n = v.chars().count();
                    n >= min && n <= max
                },
                move |key| SecretGateError::validation(key, "length_between", message.clone()),
            ),
        }
    }

    /// Requires the value to match `pattern`, surfacing `message` on
    /// violation.
    ///
    /// A pattern that fails to compile fails both channels immediately; a
    /// rule that cannot run must not silently pass.
    pub fn regex(self, pattern: &str, message: &str) -> Self {
        let message = message.to_string();
        match Regex::new(pattern) {
            Ok(re) => Self {
                chain: self.chain.check(
                    move |v| re.is_match(v),
                    move |key| SecretGateError::validation(key, "regex", message.clone()),
                ),
            },
            Err(e) => {
                let reason = format!("invalid pattern '{pattern}': {e}");
                Self {
                    chain: self.chain.fail(move |key| {
                        SecretGateError::validation(key, "regex", reason.clone())
                    }),
                }
            }
        }
    }

    /// Trims surrounding whitespace on both channels.
    pub fn trim(self) -> Self {
        Self {
            chain: self.chain.map(|v| v.trim().to_string()),
        }
    }

    /// Lowercases the value on both channels.
    pub fn to_lowercase(self) -> Self {
        Self {
            chain: self.chain.map(|v| v.to_lowercase()),
        }
    }

    /// Uppercases the value on both channels.
    pub fn to_uppercase(self) -> Self {
        Self {
            chain: self.chain.map(|v| v.to_uppercase()),
        }
    }

    /// Applies a caller-supplied predicate as a named rule.
    ///
    /// This is the extension point for rules the built-in set does not
    /// cover; `rule` appears in the error message on violation.
    pub fn validate<P>(self, rule: &'static str, predicate: P) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            chain: self.chain.check(
                move |v| predicate(v),
                move |key| {
                    SecretGateError::validation(key, rule, "custom validation rejected the value")
                },
            ),
        }
    }

    /// Parses the value as a floating point number.
    pub fn number(self) -> SecretNumber {
        SecretNumber {
            chain: self.chain.convert("number", |v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| "value does not parse as a number".to_string())
            }),
        }
    }

    /// Parses the value as a boolean.
    ///
    /// Exactly the literals `"true"` and `"false"` are accepted, case
    /// insensitively; the raw value is compared, so padded strings do not
    /// parse. `"1"`, `"yes"` and friends are parse failures too.
    pub fn boolean(self) -> SecretBool {
        SecretBool {
            chain: self.chain.convert("boolean", |v| {
                if v.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if v.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err("value is neither 'true' nor 'false'".to_string())
                }
            }),
        }
    }

    /// Deserializes the value as JSON into `T`.
    ///
    /// Parse failures report the position only, never the raw value.
    pub fn json<T>(self) -> SecretJson<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        SecretJson {
            chain: self.chain.convert("json", |v| {
                serde_json::from_str::<T>(v).map_err(|e| {
                    format!(
                        "value is not valid JSON (line {}, column {})",
                        e.line(),
                        e.column()
                    )
                })
            }),
        }
    }

    /// Synchronous access to the value.
    ///
    /// Returns the value when it is synchronously known and has passed
    /// every rule. When nothing is available without awaiting, the error
    /// names the key and both remedies (await the expression, or preload
    /// the key first).
    pub fn value(self) -> Result<String> {
        self.chain.into_value()
    }
}

impl IntoFuture for SecretString {
    type Output = Result<String>;
    type IntoFuture = BoxFuture<'static, Result<String>>;

    fn into_future(self) -> Self::IntoFuture {
        self.chain.fut
    }
}

/// A numeric secret value with chainable range rules.
pub struct SecretNumber {
    chain: Chain<f64>,
}

impl SecretNumber {
    /// The key this wrapper was created for.
    pub fn key(&self) -> &str {
        &self.chain.key
    }

    /// Requires `value >= bound`.
    pub fn min(self, bound: f64) -> Self {
        let message = format!("value must be at least {bound}");
        Self {
            chain: self.chain.check(
                move |v| *v >= bound,
                move |key| SecretGateError::validation(key, "min", message.clone()),
            ),
        }
    }

    /// Requires `value <= bound`.
    pub fn max(self, bound: f64) -> Self {
        let message = format!("value must be at most {bound}");
        Self {
            chain: self.chain.check(
                move |v| *v <= bound,
                move |key| SecretGateError::validation(key, "max", message.clone()),
            ),
        }
    }

    /// Requires the value to fall within `[low, high]`, bounds included.
    pub fn between(self, low: f64, high: f64) -> Self {
        let message = format!("value must be between {low} and {high}");
        Self {
            chain: self.chain.check(
                move |v| *v >= low && *v <= high,
                move |key| SecretGateError::validation(key, "between", message.clone()),
            ),
        }
    }

    /// Requires `value > 0`. Zero fails.
    pub fn positive(self) -> Self {
        Self {
            chain: self.chain.check(
                |v| *v > 0.0,
                |key| SecretGateError::validation(key, "positive", "value must be greater than zero"),
            ),
        }
    }

    /// Requires `value < 0`. Zero fails.
    pub fn negative(self) -> Self {
        Self {
            chain: self.chain.check(
                |v| *v < 0.0,
                |key| SecretGateError::validation(key, "negative", "value must be less than zero"),
            ),
        }
    }

    /// Requires the value to have no fractional part.
    pub fn integer(self) -> Self {
        Self {
            chain: self.chain.check(
                |v| v.fract() == 0.0,
                |key| SecretGateError::validation(key, "integer", "value must be an integer"),
            ),
        }
    }

    /// Synchronous access to the parsed number.
    pub fn value(self) -> Result<f64> {
        self.chain.into_value()
    }
}

impl IntoFuture for SecretNumber {
    type Output = Result<f64>;
    type IntoFuture = BoxFuture<'static, Result<f64>>;

    fn into_future(self) -> Self::IntoFuture {
        self.chain.fut
    }
}

/// A boolean secret value.
pub struct SecretBool {
    chain: Chain<bool>,
}

impl SecretBool {
    /// The key this wrapper was created for.
    pub fn key(&self) -> &str {
        &self.chain.key
    }

    /// Requires the value to be `true`.
    pub fn is_true(self) -> Self {
        Self {
            chain: self.chain.check(
                |v| *v,
                |key| SecretGateError::validation(key, "is_true", "value must be true"),
            ),
        }
    }

    /// Requires the value to be `false`.
    pub fn is_false(self) -> Self {
        Self {
            chain: self.chain.check(
                |v| !*v,
                |key| SecretGateError::validation(key, "is_false", "value must be false"),
            ),
        }
    }

    /// Synchronous access to the parsed boolean.
    pub fn value(self) -> Result<bool> {
        self.chain.into_value()
    }
}

impl IntoFuture for SecretBool {
    type Output = Result<bool>;
    type IntoFuture = BoxFuture<'static, Result<bool>>;

    fn into_future(self) -> Self::IntoFuture {
        self.chain.fut
    }
}

/// A secret value deserialized from JSON.
pub struct SecretJson<T> {
    chain: Chain<T>,
}

impl<T: Send + 'static> SecretJson<T> {
    /// The key this wrapper was created for.
    pub fn key(&self) -> &str {
        &self.chain.key
    }

    /// Synchronous access to the deserialized value.
    pub fn value(self) -> Result<T> {
        self.chain.into_value()
    }
}

impl<T: Send + 'static> IntoFuture for SecretJson<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.chain.fut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn ready(key: &str, value: &str) -> SecretString {
        SecretString::ready(key, value.to_string())
    }

    fn rule_of(err: &SecretGateError) -> &'static str {
        match err {
            SecretGateError::Validation { rule, .. } => rule,
            other => panic!("expected a validation error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn both_channels_agree_on_success() {
        let sync_value = ready("TOKEN", "abc-123").required().value().unwrap();
        let async_value = ready("TOKEN", "abc-123").required().await.unwrap();
        assert_eq!(sync_value, "abc-123");
        assert_eq!(sync_value, async_value);
    }

    #[tokio::test]
    async fn required_rejects_empty_on_both_channels() {
        let sync_err = ready("EMPTY", "").required().value().unwrap_err();
        assert_eq!(rule_of(&sync_err), "required");
        assert!(sync_err.to_string().contains("EMPTY"));

        let async_err = ready("EMPTY", "").required().await.unwrap_err();
        assert_eq!(rule_of(&async_err), "required");
    }

    #[tokio::test]
    async fn required_passes_plain_value() {
        let value = ready("KIKE", "12345").required().await.unwrap();
        assert_eq!(value, "12345");
    }

    #[tokio::test]
    async fn pending_value_awaits_but_never_coerces() {
        let err = SecretString::pending("LATER", async { Ok("abc".to_string()) })
            .value()
            .unwrap_err();
        assert!(matches!(
            err,
            SecretGateError::SyncAccessWithoutPreload { .. }
        ));
        assert!(err.to_string().contains("LATER"));
        assert!(err.to_string().contains("preload"));

        let value = SecretString::pending("LATER", async { Ok("abc".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "abc");
    }

    #[tokio::test]
    async fn pending_rules_run_when_the_value_arrives() {
        let err = SecretString::pending("LATER", async { Ok(String::new()) })
            .required()
            .await
            .unwrap_err();
        assert_eq!(rule_of(&err), "required");
    }

    #[tokio::test]
    async fn not_empty_rejects_whitespace_that_required_accepts() {
        assert!(ready("K", "   ").required().value().is_ok());

        let err = ready("K", "   ").not_empty().value().unwrap_err();
        assert_eq!(rule_of(&err), "not_empty");
    }

    #[tokio::test]
    async fn length_between_is_inclusive() {
        assert!(ready("K", "abc").length_between(3, 5).value().is_ok());
        assert!(ready("K", "abcde").length_between(3, 5).value().is_ok());

        let err = ready("K", "ab").length_between(3, 5).value().unwrap_err();
        assert_eq!(rule_of(&err), "length_between");
        assert!(ready("K", "abcdef").length_between(3, 5).await.is_err());
    }

    #[tokio::test]
    async fn regex_accepts_and_rejects_with_custom_message() {
        let value = ready("TOKEN", "abc-123")
            .required()
            .regex("(?i)^[-a-z0-9]+$", "token format")
            .await
            .unwrap();
        assert_eq!(value, "abc-123");

        let err = ready("TOKEN", "abc-123")
            .required()
            .regex("^[0-9]+$", "msg")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("msg"));
        assert!(err.to_string().contains("TOKEN"));
    }

    #[tokio::test]
    async fn unparseable_pattern_fails_both_channels() {
        let sync_err = ready("K", "fine").regex("(", "unused").value().unwrap_err();
        assert_eq!(rule_of(&sync_err), "regex");
        assert!(sync_err.to_string().contains("invalid pattern"));

        let async_err = ready("K", "fine").regex("(", "unused").await.unwrap_err();
        assert_eq!(rule_of(&async_err), "regex");

        // Even a missing sync value turns into the pattern failure, not a
        // sync-access complaint
        let pending_err = SecretString::pending("K", async { Ok("fine".to_string()) })
            .regex("(", "unused")
            .value()
            .unwrap_err();
        assert_eq!(rule_of(&pending_err), "regex");
    }

    #[tokio::test]
    async fn transformations_apply_to_both_channels() {
        let sync_value = ready("K", "  MiXeD  ").trim().to_lowercase().value().unwrap();
        assert_eq!(sync_value, "mixed");

        let async_value = ready("K", "  MiXeD  ").trim().to_uppercase().await.unwrap();
        assert_eq!(async_value, "MIXED");
    }

    #[tokio::test]
    async fn number_parses_and_rejects() {
        let value = ready("KIKE", "12345").number().await.unwrap();
        assert_eq!(value, 12345.0);

        let err = ready("K", "not-a-number").number().value().unwrap_err();
        assert_eq!(rule_of(&err), "number");
        // The raw value never appears in the diagnostic
        assert!(!err.to_string().contains("not-a-number"));
    }

    #[tokio::test]
    async fn between_bounds_are_inclusive() {
        assert_eq!(ready("K", "5").number().between(5.0, 10.0).await.unwrap(), 5.0);
        assert_eq!(ready("K", "10").number().between(5.0, 10.0).await.unwrap(), 10.0);

        let low = ready("K", "4.9").number().between(5.0, 10.0).await.unwrap_err();
        assert_eq!(rule_of(&low), "between");
        let high = ready("K", "10.1").number().between(5.0, 10.0).value().unwrap_err();
        assert_eq!(rule_of(&high), "between");
    }

    #[tokio::test]
    async fn zero_is_neither_positive_nor_negative() {
        assert_eq!(rule_of(&ready("K", "0").number().positive().value().unwrap_err()), "positive");
        assert_eq!(rule_of(&ready("K", "0").number().negative().value().unwrap_err()), "negative");

        assert!(ready("K", "0.1").number().positive().value().is_ok());
        assert!(ready("K", "-0.1").number().negative().value().is_ok());
    }

    #[tokio::test]
    async fn integer_rejects_fractions() {
        assert_eq!(ready("K", "42").number().integer().await.unwrap(), 42.0);

        let err = ready("K", "3.5").number().integer().await.unwrap_err();
        assert_eq!(rule_of(&err), "integer");
    }

    #[tokio::test]
    async fn chained_numeric_rules_agree_across_channels() {
        let sync_value = ready("K", "42").number().min(10.0).max(50.0).integer().value().unwrap();
        let async_value = ready("K", "42").number().min(10.0).max(50.0).integer().await.unwrap();
        assert_eq!(sync_value, async_value);
    }

    #[tokio::test]
    async fn boolean_accepts_exactly_two_literals() {
        assert!(ready("DEBUG", "true").boolean().is_true().await.unwrap());
        assert!(ready("DEBUG", "TRUE").boolean().is_true().value().unwrap());
        assert!(!ready("DEBUG", "False").boolean().is_false().await.unwrap());

        for literal in ["1", "yes", "on", "truthy", "", " true ", "false\n"] {
            let err = ready("DEBUG", literal).boolean().value().unwrap_err();
            assert_eq!(rule_of(&err), "boolean", "literal {literal:?} must not parse");
        }
    }

    #[tokio::test]
    async fn is_true_rejects_false() {
        let err = ready("DEBUG", "false").boolean().is_true().await.unwrap_err();
        assert_eq!(rule_of(&err), "is_true");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Creds {
        user: String,
        attempts: u32,
    }

    #[tokio::test]
    async fn json_deserializes_into_typed_values() {
        let creds = ready("CREDS", r#"{"user":"admin","attempts":3}"#)
            .json::<Creds>()
            .await
            .unwrap();
        assert_eq!(
            creds,
            Creds {
                user: "admin".to_string(),
                attempts: 3
            }
        );

        let sync_creds = ready("CREDS", r#"{"user":"admin","attempts":3}"#)
            .json::<Creds>()
            .value()
            .unwrap();
        assert_eq!(sync_creds.user, "admin");
    }

    #[tokio::test]
    async fn json_failure_hides_the_raw_value() {
        let err = ready("CREDS", "hunter2-is-not-json")
            .json::<Creds>()
            .value()
            .unwrap_err();
        assert_eq!(rule_of(&err), "json");
        assert!(!err.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn validate_is_the_custom_rule_hook() {
        let ok = ready("KEY", "sk-live-123")
            .validate("sk_prefix", |v| v.starts_with("sk-"))
            .await;
        assert!(ok.is_ok());

        let err = ready("KEY", "pk-live-123")
            .validate("sk_prefix", |v| v.starts_with("sk-"))
            .value()
            .unwrap_err();
        assert_eq!(rule_of(&err), "sk_prefix");
    }

    #[tokio::test]
    async fn broken_wrapper_fails_both_channels() {
        let sync_err = SecretString::broken("ANY", "sources unavailable")
            .required()
            .value()
            .unwrap_err();
        assert!(matches!(sync_err, SecretGateError::Initialization(_)));
        assert!(sync_err.to_string().contains("sources unavailable"));

        let async_err = SecretString::broken("ANY", "sources unavailable").await.unwrap_err();
        assert!(matches!(async_err, SecretGateError::Initialization(_)));
    }

    #[tokio::test]
    async fn first_failure_wins() {
        let err = ready("K", "").required().length_between(1, 5).value().unwrap_err();
        assert_eq!(rule_of(&err), "required");

        let err = ready("K", "").required().length_between(1, 5).await.unwrap_err();
        assert_eq!(rule_of(&err), "required");
    }

    #[test]
    fn key_survives_the_chain() {
        let wrapper = ready("DATABASE_URL", "postgres://x").required().trim();
        assert_eq!(wrapper.key(), "DATABASE_URL");

        let number = ready("PORT", "5432").number().min(1.0);
        assert_eq!(number.key(), "PORT");
    }
}
