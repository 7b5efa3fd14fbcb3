//! Edge detection for the per-button `raise` and `press` signals.
//!
//! Buttons arrive as levels sampled once per tick. Actions fire on the rising edge only, so a performer
//! holding a button down (or a sluggish debounce upstream) never repeats the action.

/// The outcome of one [`RisingEdges::update`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Rising {
    /// The lowest-numbered button which rose; this is the one that acts.
    pub(crate) first: Option<usize>,
    /// Other buttons which rose on the same tick and were passed over.
    pub(crate) passed_over: usize,
}

/// Remembers the previous level of each of `N` buttons.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RisingEdges<const N: usize> {
    previous: [bool; N],
}

impl<const N: usize> RisingEdges<N> {
    pub(crate) fn new() -> Self {
        Self {
            previous: [false; N],
        }
    }

    /// Records `levels` and reports which buttons went from low to high since the last call.
    ///
    /// Only one button may act per tick. The hardware cannot tell simultaneous edges apart from bounce, so the
    /// lowest-numbered one wins and the rest are counted in [`Rising::passed_over`] for the caller to report.
    pub(crate) fn update(&mut self, levels: &[bool; N]) -> Rising {
        let mut rose = (0..N).filter(|&i| levels[i] && !self.previous[i]);
        let rising = Rising {
            first: rose.next(),
            passed_over: rose.count(),
        };
        self.previous = *levels;
        rising
    }
}
