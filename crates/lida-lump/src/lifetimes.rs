//! Lifetime synthesis
//!
//! Total lifetime of a composite state combines its decay channels in
//! parallel: `1/tau = sum(1/tau_if)`. Only a few channels per state are kept
//! in the output; their partial lifetimes are rescaled by `tau / tau_five`
//! so the kept channels alone still reproduce `tau`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use lida_core::{LidaError, LidaResult, LumpedId};
use tracing::info;

use crate::{ChannelRanking, CompositeTransition, StateTable};

/// Parallel (harmonic) combination of partial lifetimes
///
/// Returns infinity when there is no decay at all.
pub fn harmonic_lifetime<I>(partial_lifetimes: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let rate: f64 = partial_lifetimes.into_iter().map(|tau| 1.0 / tau).sum();
    if rate > 0.0 {
        1.0 / rate
    } else {
        f64::INFINITY
    }
}

impl ChannelRanking {
    /// Order in which channels are retained
    fn compare(self, a: &CompositeTransition, b: &CompositeTransition) -> Ordering {
        let by_tau = match self {
            ChannelRanking::LongestLived => b.tau_if.total_cmp(&a.tau_if),
            ChannelRanking::Dominant => a.tau_if.total_cmp(&b.tau_if),
        };
        by_tau.then_with(|| a.f.cmp(&b.f))
    }
}

/// Fill `tau`, `tau_five` and `renorm` of every composite state and return the
/// retained, rescaled channels (at most `top_channels` per initial state),
/// ordered by initial state and then by rank.
pub fn synthesize_lifetimes(
    states: &mut StateTable,
    transitions: Vec<CompositeTransition>,
    top_channels: usize,
    ranking: ChannelRanking,
) -> LidaResult<Vec<CompositeTransition>> {
    let mut channels: BTreeMap<LumpedId, Vec<CompositeTransition>> = BTreeMap::new();
    let mut silent = 0u64;
    for transition in transitions {
        for id in [transition.i, transition.f] {
            if states.get(id).is_none() {
                return Err(LidaError::MissingLumpedState(id));
            }
        }
        // zero-rate channels do not decay
        if !transition.tau_if.is_finite() {
            silent += 1;
            continue;
        }
        channels.entry(transition.i).or_default().push(transition);
    }

    for state in states.iter_mut() {
        state.tau = f64::INFINITY;
        state.tau_five = f64::INFINITY;
        state.renorm = 1.0;
    }

    let mut retained = Vec::new();
    for (i, mut outgoing) in channels {
        // same summation order for both lifetimes, so untruncated states get renorm == 1
        outgoing.sort_by(|a, b| ranking.compare(a, b));
        let tau = harmonic_lifetime(outgoing.iter().map(|t| t.tau_if));
        outgoing.truncate(top_channels);
        let tau_five = harmonic_lifetime(outgoing.iter().map(|t| t.tau_if));
        let renorm = tau / tau_five;

        let state = states.get_mut(i).ok_or(LidaError::MissingLumpedState(i))?;
        state.tau = tau;
        state.tau_five = tau_five;
        state.renorm = renorm;

        retained.extend(outgoing.into_iter().map(|t| CompositeTransition {
            tau_if: t.tau_if * renorm,
            ..t
        }));
    }

    info!(
        retained = retained.len(),
        zero_rate = silent,
        top_channels,
        "lifetimes synthesized"
    );

    Ok(retained)
}
