/// Which trained models no longer reflect the current configuration.
///
/// The states form a lattice, `Clean` below both partial states and
/// `AllStale` above them; mutators [`join`](Staleness::join) their target
/// state into the current one and only training moves back to `Clean`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Staleness {
    Clean,
    BackgroundStale,
    SpeakersStale,
    #[default]
    AllStale,
}

impl Staleness {
    /// Least upper bound of two states.
    pub fn join(self, other: Self) -> Self {
        match (self, other) {
            (Self::Clean, s) | (s, Self::Clean) => s,
            (a, b) if a == b => a,
            _ => Self::AllStale,
        }
    }

    pub fn is_clean(self) -> bool {
        self == Self::Clean
    }

    pub fn background_stale(self) -> bool {
        matches!(self, Self::BackgroundStale | Self::AllStale)
    }

    pub fn speakers_stale(self) -> bool {
        matches!(self, Self::SpeakersStale | Self::AllStale)
    }
}

/// Counts of the training work performed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainingStats {
    pub background_trainings: usize,
    /// Passes over the speaker data, each (re)building every speaker model.
    pub speaker_passes: usize,
    /// Speaker models trained or adapted.
    pub models_trained: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use Staleness::*;

    #[test]
    fn join_is_least_upper_bound() {
        let all = [Clean, BackgroundStale, SpeakersStale, AllStale];
        for a in all {
            assert_eq!(a.join(Clean), a);
            assert_eq!(Clean.join(a), a);
            assert_eq!(a.join(a), a);
            assert_eq!(a.join(AllStale), AllStale);
            for b in all {
                assert_eq!(a.join(b), b.join(a), "{a:?} join {b:?} not commutative");
            }
        }
        assert_eq!(BackgroundStale.join(SpeakersStale), AllStale);
    }

    #[test]
    fn stale_queries() {
        assert!(!Clean.background_stale() && !Clean.speakers_stale());
        assert!(BackgroundStale.background_stale() && !BackgroundStale.speakers_stale());
        assert!(!SpeakersStale.background_stale() && SpeakersStale.speakers_stale());
        assert!(AllStale.background_stale() && AllStale.speakers_stale());
        assert_eq!(Staleness::default(), AllStale);
    }
}
