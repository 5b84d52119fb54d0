#![warn(missing_docs)]
//! # warden-core
//!
//! ## Purpose
//! Defines the pure session data model used across the `warden` workspace.
//!
//! ## Responsibilities
//! - Represent the persisted credential triple and its expiry semantics.
//! - Represent roles and the resolved active identity.
//! - Extract the subject claim from an access token payload.
//!
//! ## Data flow
//! The session layer assembles a [`Credential`] from vault reads, extracts the
//! subject via [`subject_from_access_token`], and resolves an [`Identity`]
//! that the policy layer evaluates permissions against.
//!
//! ## Ownership and lifetimes
//! Credential and identity values own their strings so that storage, session,
//! and policy layers never share hidden borrows across await points.
//!
//! ## Error model
//! This crate favors absence over errors: malformed token material and
//! incomplete credential triples yield `None`, never a panic or error value.
//!
//! ## Security and privacy notes
//! Token and subject values are treated as opaque strings and are never
//! logged by this crate.
//!
//! ## Example
//! ```rust
//! use warden_core::{Credential, Role};
//!
//! let credential = Credential::from_parts(
//!     Some("token".to_string()),
//!     Some("1000".to_string()),
//!     Some("refresh".to_string()),
//! )
//! .expect("complete triple should assemble");
//! assert!(credential.is_expired(1_000));
//! assert_eq!(Role::from_name("ADMIN"), Some(Role::Admin));
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Storage key holding the sealed access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key holding the sealed access token expiry (epoch milliseconds).
pub const ACCESS_TOKEN_EXPIRE_KEY: &str = "access_token_expire";

/// Storage key holding the sealed refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// The persisted credential triple.
///
/// The triple is all-or-nothing: when any field is missing from storage the
/// whole session is treated as absent. [`Credential::from_parts`] enforces
/// that invariant at assembly time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Bearer token attached to authorized backend calls.
    pub access_token: String,
    /// Absolute expiry deadline in Unix epoch milliseconds.
    pub access_token_expiry_ms: u64,
    /// Single-use token exchanged for a fresh credential.
    pub refresh_token: String,
}

impl Credential {
    /// Assembles a credential from raw storage reads.
    ///
    /// Returns `None` when any part is missing, blank, or the expiry is not a
    /// parseable millisecond timestamp. A partially present triple is
    /// indistinguishable from "no session".
    pub fn from_parts(
        access_token: Option<String>,
        access_token_expiry_ms: Option<String>,
        refresh_token: Option<String>,
    ) -> Option<Self> {
        let access_token = non_blank(access_token)?;
        let refresh_token = non_blank(refresh_token)?;
        let access_token_expiry_ms = non_blank(access_token_expiry_ms)?.parse::<u64>().ok()?;

        Some(Self {
            access_token,
            access_token_expiry_ms,
            refresh_token,
        })
    }

    /// Returns `true` when the access token has expired at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.access_token_expiry_ms
    }
}

/// Privilege role assigned to an identity, ordered by worth in the policy
/// layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Account is blocked from all privileged operations.
    Blocked,
    /// Account exists but has no relevant standing.
    NotRelevant,
    /// Read-only access; also the default for identities without a role.
    Visitor,
    /// May create and edit owned resources.
    Contributor,
    /// May manage lower-ranked identities and groups.
    Manager,
    /// Full administrative access.
    Admin,
}

impl Role {
    /// Parses a backend wire name into a role.
    ///
    /// Unknown names yield `None`; the policy layer ranks unlisted names
    /// below every known role.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BLOCKED" => Some(Self::Blocked),
            "NOT_RELEVANT" => Some(Self::NotRelevant),
            "VISITOR" => Some(Self::Visitor),
            "CONTRIBUTOR" => Some(Self::Contributor),
            "MANAGER" => Some(Self::Manager),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Returns the backend wire name for this role.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blocked => "BLOCKED",
            Self::NotRelevant => "NOT_RELEVANT",
            Self::Visitor => "VISITOR",
            Self::Contributor => "CONTRIBUTOR",
            Self::Manager => "MANAGER",
            Self::Admin => "ADMIN",
        }
    }
}

/// The resolved subject of the current credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identification string (the token subject).
    pub id: String,
    /// Assigned role; `None` is evaluated as [`Role::Visitor`].
    pub role: Option<Role>,
    /// Global administrators outrank every role comparison.
    pub is_global_admin: bool,
}

impl Identity {
    /// Creates an identity value.
    pub fn new(id: impl Into<String>, role: Option<Role>, is_global_admin: bool) -> Self {
        Self {
            id: id.into(),
            role,
            is_global_admin,
        }
    }
}

/// Claims payload carried in the middle segment of an access token.
#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    #[serde(default)]
    sub: Option<String>,
}

/// Extracts the subject claim from a three-part access token.
///
/// # Semantics
/// The token is split on `.`, the middle segment is decoded as URL-safe
/// base64 without padding, and the `sub` field is read from the JSON claims
/// payload. Any failure along the way yields `None`: a malformed token means
/// identity resolution is skipped, never escalated.
pub fn subject_from_access_token(access_token: &str) -> Option<String> {
    let segments: Vec<&str> = access_token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    let payload = URL_SAFE_NO_PAD.decode(segments[1]).ok()?;
    let claims: AccessTokenClaims = serde_json::from_slice(&payload).ok()?;
    non_blank(claims.sub)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
