//! Search and evaluation tunables.
//!
//! The teacher's `bot-minimax` hardcodes its piece values and time slice as
//! `const`s directly in `main.rs`. This crate pulls the equivalent knobs out
//! into one immutable, cloneable value so the search and evaluator can be
//! built once per engine instance and so a parameter tuner (out of scope
//! here) has somewhere to write discovered values. When the `config` feature
//! is enabled, a `Params` can be loaded from a TOML file.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Immutable container of search and evaluation tunables.
///
/// Constructed once (typically via [`Params::default`] or
/// [`Params::from_toml_str`]) and shared by reference across the evaluator
/// and search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct Params {
    /// Null-move reduction (plies subtracted beyond the standard one).
    pub null_move_reduction: u8,
    /// Minimum remaining depth (in plies) to attempt null-move pruning.
    pub null_move_min_depth: u8,
    /// Futility margin at one ply from the horizon.
    pub futility_margin_1: i32,
    /// Futility margin at two plies from the horizon.
    pub futility_margin_2: i32,
    /// Razoring margin at three plies from the horizon.
    pub razoring_margin_3: i32,
    /// Late-move reduction applied once `late_move_threshold` quiets have
    /// already been searched at a node.
    pub late_move_reduction: u8,
    /// Number of quiet moves searched at full depth before LMR applies.
    pub late_move_threshold: u8,
    /// Aspiration window half-width in centipawns.
    pub aspiration_delta: i32,
    /// Quiescence delta-pruning margin in centipawns.
    pub quiescence_delta: i32,
    /// Hard cap on quiescence recursion depth (spec's `MAX_QUIESCENCE_PLY`).
    pub max_quiescence_ply: u8,
    /// Depth (in plies) above which internal iterative deepening kicks in
    /// when no hash move is available at a PV node.
    pub iid_min_depth: u8,
    /// Reduction applied to the shallow internal-iterative-deepening probe.
    pub iid_reduction: u8,
    /// Lazy-eval window margin either side of `[alpha, beta]`.
    pub lazy_eval_margin: i32,
    /// Bishop pair bonus, midgame/endgame.
    pub bishop_pair: (i32, i32),
    /// Tempo bonus awarded to the side to move.
    pub tempo: i32,
    /// Per-square-of-blockage penalty for a blocked pawn (index 0 = one
    /// square blocked, up to 2).
    pub blocked_pawn_penalty: [i32; 3],
    /// Penalty for a piece sitting directly in front of its own pawn.
    pub stopped_pawn_penalty: i32,
    /// Passed-pawn bonus by rank-from-promotion (0 = about to promote).
    pub passed_pawn_bonus: [i32; 7],
    /// Backward (open) pawn penalty.
    pub backward_pawn_penalty: i32,
    /// Doubled pawn penalty.
    pub doubled_pawn_penalty: i32,
    /// Isolated pawn penalty.
    pub isolated_pawn_penalty: i32,
    /// King-to-pawn tropism weight: (normal, passed, backward).
    pub king_pawn_tropism_weight: (i32, i32, i32),
    /// Queen-king Chebyshev tropism weight per unit distance.
    pub queen_king_tropism_weight: i32,
    /// Mobility weight per attacked square, indexed by `Piece::index()` for
    /// knight/bishop/rook/queen (pawn/king entries unused).
    pub mobility_weight: [i32; 6],
    /// Penalty for a pinned piece, indexed by `Piece::index()`.
    pub pin_penalty: [i32; 6],
    /// Transposition table size in megabytes.
    pub tt_size_mb: usize,
    /// Evaluation cache size in megabytes.
    pub eval_cache_size_mb: usize,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            null_move_reduction: 2,
            null_move_min_depth: 3,
            futility_margin_1: 150,
            futility_margin_2: 300,
            razoring_margin_3: 450,
            late_move_reduction: 1,
            late_move_threshold: 4,
            aspiration_delta: 25,
            quiescence_delta: 150,
            max_quiescence_ply: 24,
            iid_min_depth: 4,
            iid_reduction: 2,
            lazy_eval_margin: 50,
            bishop_pair: (30, 40),
            tempo: 10,
            blocked_pawn_penalty: [-10, -20, -30],
            stopped_pawn_penalty: -5,
            passed_pawn_bonus: [0, 10, 17, 24, 38, 60, 90],
            backward_pawn_penalty: -8,
            doubled_pawn_penalty: -12,
            isolated_pawn_penalty: -10,
            king_pawn_tropism_weight: (2, 4, 1),
            queen_king_tropism_weight: 3,
            mobility_weight: [0, 4, 5, 3, 1, 0],
            pin_penalty: [0, -8, -12, -20, -35, 0],
            tt_size_mb: 64,
            eval_cache_size_mb: 16,
        }
    }
}

#[cfg(feature = "config")]
impl Params {
    /// Parses a `Params` value from TOML text, filling any field the
    /// document omits from [`Params::default`].
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serializes this value back to TOML, for a tuner to persist discovered
    /// parameters.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_sane() {
        let params = Params::default();
        assert!(params.null_move_min_depth > 0);
        assert!(params.max_quiescence_ply > 0);
        assert!(params.tt_size_mb > 0);
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_round_trip_preserves_overrides() {
        let toml = "tempo = 99\nnull_move_reduction = 5\n";
        let params = Params::from_toml_str(toml).unwrap();
        assert_eq!(params.tempo, 99);
        assert_eq!(params.null_move_reduction, 5);
        // Fields absent from the document fall back to defaults.
        assert_eq!(params.tt_size_mb, Params::default().tt_size_mb);
    }

    #[cfg(feature = "config")]
    #[test]
    fn empty_toml_matches_default() {
        let params = Params::from_toml_str("").unwrap();
        assert_eq!(params, Params::default());
    }
}
