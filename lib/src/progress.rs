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

//! Formats the terminal-updating progress line described in §6:
//! `DONE / TOTAL objects rewritten (RATE objs/sec) in ELAPSED, ETA: ETA`.

use std::time::Duration;

use crate::scheduler::Progress;

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// Renders one progress snapshot as the single-line status text the driver
/// re-emits on every completed task.
pub fn format_progress_line(progress: Progress) -> String {
    let elapsed = progress.elapsed;
    let rate = if elapsed.as_secs_f64() > 0.0 {
        progress.done as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    let eta = if rate > 0.0 && progress.total > progress.done {
        let remaining = (progress.total - progress.done) as f64 / rate;
        format_duration(Duration::from_secs_f64(remaining.max(0.0)))
    } else {
        "00:00:00".to_string()
    };
    format!(
        "{} / {} objects rewritten ({:.1} objs/sec) in {}, ETA: {}",
        progress.done,
        progress.total,
        rate,
        format_duration(elapsed),
        eta,
    )
}
