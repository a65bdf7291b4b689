//! Stepping support.
//!
//! To step over one source line, a debugger needs every address where
//! execution can first arrive at a different line. [`StepLocationsFinder`]
//! finds them by walking the function's control-flow entries forward from
//! the paused address until the line table reports another position.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::debuginfo::{find_at_or_before, DebugInfo, Location};

/// Addresses to stop at after a step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepLocations {
    /// Absolute addresses where execution reaches another source line
    pub breakpoints: BTreeSet<u32>,
    /// Absolute addresses of calls reached before that, when stepping into
    /// calls; a subset of `breakpoints`
    pub calls: BTreeSet<u32>,
}

impl StepLocations {
    /// Returns `true` if the step leaves the function without another stop.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}

#[derive(Debug)]
struct Point {
    address: u32,
    location: Option<Location>,
    is_call: bool,
    /// Explicit successors; `None` falls through to the next point.
    next: Option<Vec<usize>>,
}

/// Computes step locations for one [`DebugInfo`].
///
/// The finder caches the merged view of the last function it stepped in.
/// It keeps scratch state between calls, so use one finder per thread.
pub struct StepLocationsFinder<'a> {
    debug_info: &'a DebugInfo,
    function_start: Option<u32>,
    points: Vec<Point>,
    visited: HashSet<usize>,
    queue: VecDeque<(usize, bool)>,
}

impl<'a> StepLocationsFinder<'a> {
    /// Creates a finder over `debug_info`.
    #[must_use]
    pub fn new(debug_info: &'a DebugInfo) -> Self {
        StepLocationsFinder {
            debug_info,
            function_start: None,
            points: Vec::new(),
            visited: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    /// Returns the debug information the finder works on.
    #[must_use]
    pub fn debug_info(&self) -> &'a DebugInfo {
        self.debug_info
    }

    /// Finds where to stop after stepping from `file_name:line`, paused at
    /// the absolute `address`.
    ///
    /// A point is a breakpoint when its source position differs from
    /// `file_name:line`; the walk does not continue past it. With
    /// `enter_method`, calls on the way are reported as well, and the walk
    /// continues behind them. Addresses outside every known function yield
    /// an empty result.
    pub fn step(
        &mut self,
        file_name: &str,
        line: u32,
        address: u32,
        enter_method: bool,
    ) -> StepLocations {
        let mut result = StepLocations::default();
        let Some(relative) = self.debug_info.relative(address) else {
            return result;
        };
        if !self.prepare(relative) {
            return result;
        }

        self.visited.clear();
        self.queue.clear();
        match find_at_or_before(&self.points, relative, |point| point.address) {
            Some(start) => {
                // At the paused point only a call still ahead counts.
                let at_call = self.points[start].address == relative && self.points[start].is_call;
                if enter_method && at_call {
                    let absolute = self.debug_info.absolute(relative);
                    result.breakpoints.insert(absolute);
                    result.calls.insert(absolute);
                }
                self.queue.push_back((start, true));
            }
            None if !self.points.is_empty() => self.queue.push_back((0, false)),
            None => {}
        }

        while let Some((index, is_start)) = self.queue.pop_front() {
            if !self.visited.insert(index) {
                continue;
            }
            let point = &self.points[index];
            if !is_start {
                let absolute = self.debug_info.absolute(point.address);
                let moved = point
                    .location
                    .as_ref()
                    .is_some_and(|location| !location.is_at(file_name, line));
                if moved {
                    result.breakpoints.insert(absolute);
                    if enter_method && point.is_call {
                        result.calls.insert(absolute);
                    }
                    continue;
                }
                if enter_method && point.is_call {
                    result.breakpoints.insert(absolute);
                    result.calls.insert(absolute);
                }
            }

            match &point.next {
                Some(next) => self
                    .queue
                    .extend(next.iter().map(|&target| (target, false))),
                None if index + 1 < self.points.len() => self.queue.push_back((index + 1, false)),
                None => {}
            }
        }
        result
    }

    /// Builds the points of the function covering the code-section address
    /// `relative`, unless they are cached already.
    fn prepare(&mut self, relative: u32) -> bool {
        let debug_info = self.debug_info;
        let Some(sequence) = debug_info.line_info.find(relative) else {
            return false;
        };
        if self.function_start == Some(sequence.start_address) {
            return true;
        }

        let unpacked = sequence.unpack();
        let control_flow = debug_info
            .control_flow
            .find(relative)
            .filter(|function| function.start_address == sequence.start_address);

        // address -> (is_call, explicit targets)
        let mut merged: BTreeMap<u32, (bool, Option<&[u32]>)> = BTreeMap::new();
        for location in &unpacked.locations {
            merged.entry(location.address).or_insert((false, None));
        }
        if let Some(function) = control_flow {
            for entry in function.entries() {
                let slot = merged.entry(entry.address).or_insert((false, None));
                if entry.is_call {
                    slot.0 = true;
                } else {
                    slot.1 = Some(entry.targets.as_slice());
                }
                for &target in &entry.targets {
                    if sequence.contains(target) {
                        merged.entry(target).or_insert((false, None));
                    }
                }
            }
        }

        let addresses: Vec<u32> = merged.keys().copied().collect();
        let index_of = |address: u32| addresses.binary_search(&address).ok();
        self.points = merged
            .iter()
            .map(|(&address, &(is_call, targets))| Point {
                address,
                location: unpacked
                    .find(address)
                    .map(|found| found.location.clone()),
                is_call,
                next: targets.map(|targets| {
                    targets
                        .iter()
                        .filter_map(|&target| index_of(target))
                        .collect()
                }),
            })
            .collect();
        self.function_start = Some(sequence.start_address);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debuginfo::DebugInfoBuilder;

    /// ```text
    /// 0x00 Main.java:1
    /// 0x04 Main.java:2    call at 0x06
    /// 0x08 Main.java:3    branch at 0x0c -> 0x00, 0x10
    /// 0x10 Main.java:4    exit at 0x12
    /// ```
    fn sample() -> DebugInfo {
        let mut b = DebugInfoBuilder::new(0x100);
        b.start_function("demo.Main", "main", 0).unwrap();
        b.location(0x00, "Main.java", 1).unwrap();
        b.location(0x04, "Main.java", 2).unwrap();
        b.call(0x06).unwrap();
        b.location(0x08, "Main.java", 3).unwrap();
        b.branch(0x0c, &[0x00, 0x10]).unwrap();
        b.location(0x10, "Main.java", 4).unwrap();
        b.branch(0x12, &[]).unwrap();
        b.end_function(0x14).unwrap();
        b.build().unwrap()
    }

    fn set(addresses: &[u32]) -> BTreeSet<u32> {
        addresses.iter().copied().collect()
    }

    #[test]
    fn test_step_over_falls_through_to_next_line() {
        let info = sample();
        let mut finder = StepLocationsFinder::new(&info);
        let step = finder.step("Main.java", 1, 0x100, false);
        assert_eq!(step.breakpoints, set(&[0x104]));
        assert!(step.calls.is_empty());
    }

    #[test]
    fn test_step_over_skips_calls() {
        let info = sample();
        let mut finder = StepLocationsFinder::new(&info);
        let step = finder.step("Main.java", 2, 0x104, false);
        assert_eq!(step.breakpoints, set(&[0x108]));
        assert!(step.calls.is_empty());
    }

    #[test]
    fn test_step_into_reports_calls() {
        let info = sample();
        let mut finder = StepLocationsFinder::new(&info);
        let step = finder.step("Main.java", 2, 0x104, true);
        assert_eq!(step.breakpoints, set(&[0x106, 0x108]));
        assert_eq!(step.calls, set(&[0x106]));

        let step = finder.step("Main.java", 2, 0x106, true);
        assert_eq!(step.calls, set(&[0x106]));
    }

    #[test]
    fn test_step_follows_branch_targets() {
        let info = sample();
        let mut finder = StepLocationsFinder::new(&info);
        let step = finder.step("Main.java", 3, 0x108, false);
        assert_eq!(step.breakpoints, set(&[0x100, 0x110]));
    }

    #[test]
    fn test_step_out_of_function() {
        let info = sample();
        let mut finder = StepLocationsFinder::new(&info);
        assert!(finder.step("Main.java", 4, 0x110, false).is_empty());
        assert!(finder.step("Main.java", 1, 0x50, false).is_empty());
        assert!(finder.step("Main.java", 1, 0x10, false).is_empty());
    }

    #[test]
    fn test_step_terminates_on_same_line_loop() {
        let mut b = DebugInfoBuilder::new(0);
        b.start_function("demo.Main", "spin", 0).unwrap();
        b.location(0, "Main.java", 7).unwrap();
        b.branch(2, &[0]).unwrap();
        b.end_function(4).unwrap();
        let info = b.build().unwrap();

        let mut finder = StepLocationsFinder::new(&info);
        assert!(finder.step("Main.java", 7, 0, false).is_empty());
    }

    #[test]
    fn test_branch_into_middle_of_line() {
        let mut b = DebugInfoBuilder::new(0);
        b.start_function("demo.Main", "main", 0).unwrap();
        b.location(0x00, "Main.java", 1).unwrap();
        b.branch(0x02, &[0x0a]).unwrap();
        b.location(0x08, "Main.java", 2).unwrap();
        b.location(0x0c, "Main.java", 3).unwrap();
        b.end_function(0x10).unwrap();
        let info = b.build().unwrap();

        let mut finder = StepLocationsFinder::new(&info);
        let step = finder.step("Main.java", 1, 0, false);
        assert_eq!(step.breakpoints, set(&[0x0a]));
    }

    #[test]
    fn test_repeated_steps_agree() {
        let info = sample();
        let mut finder = StepLocationsFinder::new(&info);
        let first = finder.step("Main.java", 3, 0x108, true);
        let second = finder.step("Main.java", 3, 0x108, true);
        assert_eq!(first, second);

        let mut fresh = StepLocationsFinder::new(&info);
        assert_eq!(fresh.step("Main.java", 3, 0x108, true), first);
    }
}
