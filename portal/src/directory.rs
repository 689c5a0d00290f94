//! In-memory filtering, sorting and faceting for the admin user directory.
//!
//! The directory is small enough to load whole: every profile is fetched (newest first), decorated
//! with roles and agency owner names, and then narrowed here. Facets are computed over the
//! unfiltered list so the filter dropdowns never shrink as the admin narrows the view.

use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use utoipa::{IntoParams, ToSchema};

use crate::api::models::users::{AgencyOwnerResponse, Role, UserResponse};
use crate::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    Email,
    Phone,
    City,
    State,
    Roles,
    Agencies,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Directory filters, combined with AND.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct DirectoryQuery {
    /// Only users holding this role
    pub role: Option<Role>,
    /// Only users linked to (or being) this agency owner
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub agency: Option<UserId>,
    /// Exact match on agency city
    pub city: Option<String>,
    /// Exact match on agency state
    pub state: Option<String>,
    /// Case-insensitive substring over email, first name and last name
    pub search: Option<String>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
}

/// `"first last"` trimmed, falling back to the email address.
pub fn person_name(first: Option<&str>, last: Option<&str>, email: &str) -> String {
    let full = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""));
    let full = full.trim();
    if full.is_empty() { email.to_string() } else { full.to_string() }
}

/// Agency name, else the owner's full name, else their email.
pub fn owner_display_name(agency_name: Option<&str>, first: Option<&str>, last: Option<&str>, email: &str) -> String {
    match agency_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => person_name(first, last, email),
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

fn matches(user: &UserResponse, query: &DirectoryQuery) -> bool {
    let role_ok = query.role.is_none_or(|role| user.roles.contains(&role));

    let agency_ok = query
        .agency
        .is_none_or(|owner| user.id == owner || user.agency_owners.iter().any(|o| o.id == owner));

    let city_ok = query
        .city
        .as_deref()
        .is_none_or(|city| user.agency_city.as_deref() == Some(city));

    let state_ok = query
        .state
        .as_deref()
        .is_none_or(|state| user.agency_state.as_deref() == Some(state));

    let search_ok = match query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(search) => {
            let needle = search.to_lowercase();
            user.email.to_lowercase().contains(&needle)
                || contains_ci(user.first_name.as_deref(), &needle)
                || contains_ci(user.last_name.as_deref(), &needle)
        }
        None => true,
    };

    role_ok && agency_ok && city_ok && state_ok && search_ok
}

fn sort_key(user: &UserResponse, field: SortField) -> SortKey {
    let text = |value: Option<&String>| SortKey::Text(value.cloned().unwrap_or_default());
    match field {
        SortField::Name => SortKey::Text(
            format!(
                "{} {}",
                user.first_name.as_deref().unwrap_or(""),
                user.last_name.as_deref().unwrap_or("")
            )
            .to_lowercase(),
        ),
        SortField::Email => SortKey::Text(user.email.to_lowercase()),
        SortField::Phone => text(user.phone_number.as_ref()),
        SortField::City => text(user.agency_city.as_ref()),
        SortField::State => text(user.agency_state.as_ref()),
        SortField::Roles => SortKey::Count(user.roles.len()),
        SortField::Agencies => SortKey::Count(user.agency_owners.len()),
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Text(String),
    Count(usize),
}

/// Apply filters, then sort. Without a sort field the incoming order is kept.
pub fn filter_and_sort(users: Vec<UserResponse>, query: &DirectoryQuery) -> Vec<UserResponse> {
    let mut filtered: Vec<UserResponse> = users.into_iter().filter(|u| matches(u, query)).collect();

    if let Some(field) = query.sort {
        let order = query.order.unwrap_or_default();
        // Stable sort keeps the base order among equal keys
        filtered.sort_by(|a, b| {
            let ord = sort_key(a, field).cmp(&sort_key(b, field));
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }

    filtered
}

/// Unique, non-empty, sorted cities and states across the whole list.
pub fn facets(users: &[UserResponse]) -> (Vec<String>, Vec<String>) {
    fn unique<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Vec<String> {
        values
            .flatten()
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    (
        unique(users.iter().map(|u| u.agency_city.as_ref())),
        unique(users.iter().map(|u| u.agency_state.as_ref())),
    )
}

/// Case-insensitive substring search over owner name, city and state.
pub fn search_agency_owners(owners: Vec<AgencyOwnerResponse>, search: Option<&str>) -> Vec<AgencyOwnerResponse> {
    let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase) else {
        return owners;
    };

    owners
        .into_iter()
        .filter(|owner| {
            owner.display_name.to_lowercase().contains(&needle)
                || person_name(owner.first_name.as_deref(), owner.last_name.as_deref(), "")
                    .to_lowercase()
                    .contains(&needle)
                || contains_ci(owner.agency_city.as_deref(), &needle)
                || contains_ci(owner.agency_state.as_deref(), &needle)
        })
        .collect()
}

/// Order owners by first name, missing names last.
pub fn compare_owners(a: &AgencyOwnerResponse, b: &AgencyOwnerResponse) -> Ordering {
    match (a.first_name.as_deref(), b.first_name.as_deref()) {
        (Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
