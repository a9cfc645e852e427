// Copyright 2021 The Jujutsu Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reference [`filtertree_lib::Filter`] implementations (§4.6): one module
//! per filter, each a faithful Rust rendition of the corresponding
//! `git-filter-tree` Python helper it's grounded on.

mod gitattributes;

pub mod decompress;
pub mod line_ending;
pub mod remove_paths;
pub mod submodule;

pub use decompress::DecompressFilter;
pub use line_ending::LineEndingFilter;
pub use remove_paths::RemovePathsFilter;
pub use submodule::SubmoduleFilter;
