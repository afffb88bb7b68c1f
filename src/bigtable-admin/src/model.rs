// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The request and response messages for the table admin service.

use gax::stream_range::PageableResponse;

/// A collection of user data indexed by row, column, and timestamp.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Table {
    /// The unique name of the table. Values are of the form
    /// `projects/{project}/instances/{instance}/tables/{table}`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// If true, the table cannot be deleted.
    pub deletion_protection: bool,
}

impl Table {
    pub fn new() -> Self {
        std::default::Default::default()
    }

    /// Sets the value of [name][Table::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the value of [deletion_protection][Table::deletion_protection].
    pub fn set_deletion_protection<T: Into<bool>>(mut self, v: T) -> Self {
        self.deletion_protection = v.into();
        self
    }
}

/// Request message for [BigtableTableAdmin::list_tables][crate::client::BigtableTableAdmin::list_tables].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListTablesRequest {
    /// The unique name of the instance for which tables should be listed.
    /// Values are of the form `projects/{project}/instances/{instance}`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub parent: String,

    /// Maximum number of results per page. Zero selects the service default.
    pub page_size: i32,

    /// The value of `next_page_token` returned by a previous call.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_token: String,
}

impl ListTablesRequest {
    pub fn new() -> Self {
        std::default::Default::default()
    }

    /// Sets the value of [parent][ListTablesRequest::parent].
    pub fn set_parent<T: Into<String>>(mut self, v: T) -> Self {
        self.parent = v.into();
        self
    }

    /// Sets the value of [page_size][ListTablesRequest::page_size].
    pub fn set_page_size<T: Into<i32>>(mut self, v: T) -> Self {
        self.page_size = v.into();
        self
    }

    /// Sets the value of [page_token][ListTablesRequest::page_token].
    pub fn set_page_token<T: Into<String>>(mut self, v: T) -> Self {
        self.page_token = v.into();
        self
    }
}

/// Response message for [BigtableTableAdmin::list_tables][crate::client::BigtableTableAdmin::list_tables].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListTablesResponse {
    /// The tables present in the requested instance.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<Table>,

    /// Set if not all tables could be returned in a single response.
    /// Pass this value to `page_token` in another request to get the next
    /// page of results.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

impl ListTablesResponse {
    pub fn new() -> Self {
        std::default::Default::default()
    }

    /// Sets the value of [tables][ListTablesResponse::tables].
    pub fn set_tables<T, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = V>,
        V: Into<Table>,
    {
        self.tables = v.into_iter().map(|i| i.into()).collect();
        self
    }

    /// Sets the value of [next_page_token][ListTablesResponse::next_page_token].
    pub fn set_next_page_token<T: Into<String>>(mut self, v: T) -> Self {
        self.next_page_token = v.into();
        self
    }
}

impl PageableResponse for ListTablesResponse {
    type PageItem = Table;

    fn items(self) -> Vec<Table> {
        self.tables
    }

    fn next_page_token(&self) -> String {
        self.next_page_token.clone()
    }
}

/// Request message for [BigtableTableAdmin::generate_consistency_token][crate::client::BigtableTableAdmin::generate_consistency_token].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct GenerateConsistencyTokenRequest {
    /// The unique name of the table. Values are of the form
    /// `projects/{project}/instances/{instance}/tables/{table}`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl GenerateConsistencyTokenRequest {
    pub fn new() -> Self {
        std::default::Default::default()
    }

    /// Sets the value of [name][GenerateConsistencyTokenRequest::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }
}

/// Response message for [BigtableTableAdmin::generate_consistency_token][crate::client::BigtableTableAdmin::generate_consistency_token].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct GenerateConsistencyTokenResponse {
    /// The generated consistency token.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub consistency_token: String,
}

impl GenerateConsistencyTokenResponse {
    pub fn new() -> Self {
        std::default::Default::default()
    }

    /// Sets the value of [consistency_token][GenerateConsistencyTokenResponse::consistency_token].
    pub fn set_consistency_token<T: Into<String>>(mut self, v: T) -> Self {
        self.consistency_token = v.into();
        self
    }
}

/// Request message for [BigtableTableAdmin::check_consistency][crate::client::BigtableTableAdmin::check_consistency].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct CheckConsistencyRequest {
    /// The unique name of the table. Values are of the form
    /// `projects/{project}/instances/{instance}/tables/{table}`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// The token created using `generate_consistency_token` for the table.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub consistency_token: String,
}

impl CheckConsistencyRequest {
    pub fn new() -> Self {
        std::default::Default::default()
    }

    /// Sets the value of [name][CheckConsistencyRequest::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the value of [consistency_token][CheckConsistencyRequest::consistency_token].
    pub fn set_consistency_token<T: Into<String>>(mut self, v: T) -> Self {
        self.consistency_token = v.into();
        self
    }
}

/// Response message for [BigtableTableAdmin::check_consistency][crate::client::BigtableTableAdmin::check_consistency].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct CheckConsistencyResponse {
    /// True only if the token is consistent. A token is consistent if
    /// replication has caught up with the restrictions specified in the
    /// request.
    pub consistent: bool,
}

impl CheckConsistencyResponse {
    pub fn new() -> Self {
        std::default::Default::default()
    }

    /// Sets the value of [consistent][CheckConsistencyResponse::consistent].
    pub fn set_consistent<T: Into<bool>>(mut self, v: T) -> Self {
        self.consistent = v.into();
        self
    }
}
