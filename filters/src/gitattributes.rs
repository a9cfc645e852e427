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

//! Shared `.gitattributes` line rewriting, used by [`crate::decompress`] and
//! [`crate::remove_paths`] — both filters need to keep that file's patterns
//! in sync with the files they rename or drop (grounded in
//! `madx_fatcutter.py::fix_gitattr_line` and `rm.py`'s inline equivalent).

/// Rewrites every line of a `.gitattributes` file with `rewrite_pattern`,
/// dropping the line entirely if `rewrite_pattern` returns `None`.
pub fn rewrite_lines(text: &str, mut rewrite_pattern: impl FnMut(&str) -> Option<String>) -> String {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.splitn(2, ' ');
            let pattern = parts.next()?;
            let rest = parts.next();
            let new_pattern = rewrite_pattern(pattern)?;
            Some(match rest {
                Some(rest) => format!("{new_pattern} {rest}"),
                None => new_pattern,
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}
