//! Iterative-deepening principal-variation search.
//!
//! Grounded on `bot-minimax/src/main.rs`'s `Searcher`/`alpha_beta`/`search`
//! triad for the overall shape (node counter with periodic time checks,
//! per-depth root move loop, UCI-style info reporting) generalized from a
//! clone-per-node negamax into an in-place PVS with transposition table,
//! killers, history, null-move pruning, and quiescence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chess_core::{Move, MoveFlag, Piece, Square};

use crate::cache::{Bound, EvalCache, Tt, MATE_THRESHOLD};
use crate::eval::evaluate;
use crate::movegen::see::see;
use crate::movegen::{generate_legal_moves, generate_tactical, MoveList};
use crate::order::{HistoryTable, KillerTable};
use crate::params::Params;
use crate::Position;

/// One full ply, expressed in the fractional units `depth` is tracked in.
/// Extensions below one full ply (check, recapture, one-reply) are granted
/// in quarters so they can accumulate without always rounding up to a full
/// ply.
const ONE_PLY: i32 = 4;

const CHECK_EXTENSION: i32 = 1;
const RECAPTURE_EXTENSION: i32 = 2;
const ONE_REPLY_EXTENSION: i32 = 2;
const MATE_THREAT_EXTENSION: i32 = ONE_PLY;

/// Score magnitude used for forced mate, before ply-distance adjustment.
pub const MATE_VALUE: i32 = 30_000;

/// Hard cap on nominal search depth reached by iterative deepening.
pub const MAX_NOMINAL_SEARCH_DEPTH: u8 = 64;

/// Shared, cooperative stop flag. Cloning shares the same underlying flag;
/// setting it from any clone (e.g. in response to a UCI `stop` command)
/// halts the search at its next time-check.
#[derive(Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        StopToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Clock and budget inputs to one `search` call. `None` in every field
/// means search until `StopToken` fires or `MAX_NOMINAL_SEARCH_DEPTH` is
/// reached.
#[derive(Debug, Clone, Default)]
pub struct SearchLimits {
    pub movetime: Option<Duration>,
    pub depth: Option<u8>,
    pub nodes: Option<u64>,
    pub white_time: Option<Duration>,
    pub black_time: Option<Duration>,
    pub white_increment: Option<Duration>,
    pub black_increment: Option<Duration>,
    pub moves_to_go: Option<u32>,
    /// Disables time management entirely (UCI `go infinite` / pondering).
    pub infinite: bool,
}

/// One iteration's worth of search progress, reported to a [`SearchObserver`]
/// after every completed nominal depth.
#[derive(Debug, Clone)]
pub struct SearchInfo {
    pub depth: u8,
    pub score_cp: i32,
    pub mate: Option<i32>,
    pub nodes: u64,
    pub elapsed: Duration,
    pub pv: Vec<Move>,
}

/// Receives progress reports as iterative deepening completes each depth.
/// A UCI front end implements this to emit `info` lines; tests can use a
/// `Vec`-collecting implementation.
pub trait SearchObserver {
    fn on_info(&mut self, info: &SearchInfo);
}

impl SearchObserver for () {
    fn on_info(&mut self, _info: &SearchInfo) {}
}

/// The long-lived heuristic state a search reuses across successive root
/// searches: the transposition and evaluation caches, killer table, and
/// history table. Held by the engine, not recreated per move.
pub struct SearchState {
    pub tt: Tt,
    pub eval_cache: EvalCache,
    killers: KillerTable,
    history: HistoryTable,
}

impl SearchState {
    pub fn new(params: &Params) -> Self {
        SearchState {
            tt: Tt::new(params.tt_size_mb),
            eval_cache: EvalCache::new(params.eval_cache_size_mb),
            killers: KillerTable::new(),
            history: HistoryTable::new(),
        }
    }

    /// Called once at the start of each root `search` call: advances both
    /// caches' generations and decays history so recent games dominate
    /// move ordering over stale ones. Killers are cleared since they're
    /// only meaningful within one search tree.
    fn begin_search(&mut self) {
        self.tt.new_generation();
        self.eval_cache.new_generation();
        self.history.decay();
        self.killers.clear();
    }
}

struct Ctx<'a> {
    params: &'a Params,
    tt: &'a Tt,
    eval_cache: &'a EvalCache,
    killers: &'a mut KillerTable,
    history: &'a mut HistoryTable,
    nodes: u64,
    stop: &'a StopToken,
    stopped: bool,
    start: Instant,
    deadline: Option<Instant>,
    node_limit: Option<u64>,
}

impl<'a> Ctx<'a> {
    fn check_stop(&mut self) {
        if self.stopped {
            return;
        }
        if !self.nodes.is_multiple_of(2048) {
            return;
        }
        if self.stop.is_stopped() {
            self.stopped = true;
            return;
        }
        if let Some(limit) = self.node_limit {
            if self.nodes >= limit {
                self.stopped = true;
                return;
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.stopped = true;
            }
        }
    }
}

fn mate_score(ply: u8) -> i32 {
    -(MATE_VALUE - ply as i32)
}

fn decode_compact_move(compact: u16) -> Option<(Square, Square, MoveFlag)> {
    let from = Square::from_index((compact & 0x3F) as u8)?;
    let to = Square::from_index(((compact >> 6) & 0x3F) as u8)?;
    let flag_bits = (compact >> 12) & 0xF;
    let flag = match flag_bits {
        0 => MoveFlag::Normal,
        1 => MoveFlag::DoublePush,
        2 => MoveFlag::CastleKingside,
        3 => MoveFlag::CastleQueenside,
        4 => MoveFlag::EnPassant,
        5 => MoveFlag::PromoteKnight,
        6 => MoveFlag::PromoteBishop,
        7 => MoveFlag::PromoteRook,
        8 => MoveFlag::PromoteQueen,
        _ => return None,
    };
    Some((from, to, flag))
}

/// Decodes a transposition-table's compact (from, to, flag) triple and
/// matches it against a fully generated legal move list (the `isLegal`
/// shape: full-list membership) to recover the fully-populated [`Move`].
/// Used where the list is already in hand, e.g. PV extraction.
fn resolve_hash_move(compact: u16, legal: &MoveList) -> Option<Move> {
    let (from, to, flag) = decode_compact_move(compact)?;
    legal
        .as_slice()
        .iter()
        .copied()
        .find(|m| m.from() == from && m.to() == to && m.flag() == flag)
}

/// Decodes and validates a transposition-table hash move against the
/// current position via `Position::is_legal_soft` (the `isLegalSoft`
/// shape: a make/unmake replay, no move generation at all). Used on the
/// hot per-node hash-move lookup so a TT hit never forces a full legal
/// move generation just to check one move.
fn resolve_hash_move_soft(position: &mut Position, compact: u16) -> Option<Move> {
    let (from, to, flag) = decode_compact_move(compact)?;
    position.is_legal_soft(from, to, flag)
}

fn is_tactical(m: Move) -> bool {
    m.is_capture() || m.flag().is_promotion()
}

fn mvv_lva_value(m: Move) -> i32 {
    const PIECE_VALUE: [i32; 6] = [100, 320, 330, 500, 900, 0];
    let mut value = match m.captured_piece() {
        Some(p) => PIECE_VALUE[p.index()] - PIECE_VALUE[m.moved_piece().unwrap().index()],
        None => -PIECE_VALUE[m.moved_piece().unwrap().index()],
    };
    if m.flag().is_promotion() {
        value += PIECE_VALUE[Piece::Queen.index()];
    }
    value
}

fn has_non_pawn_material(position: &Position, color: chess_core::Color) -> bool {
    [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen]
        .iter()
        .any(|&p| position.pieces_of(p, color).is_not_empty())
}

/// Runs the iterative-deepening search and returns the best root move, if
/// any legal move exists.
pub fn search(
    position: &Position,
    limits: SearchLimits,
    params: &Params,
    state: &mut SearchState,
    stop: &StopToken,
    observer: &mut dyn SearchObserver,
) -> Option<Move> {
    state.begin_search();
    stop.reset();

    let mut position = position.clone();
    let legal = generate_legal_moves(&position);
    if legal.is_empty() {
        return None;
    }

    let start = Instant::now();
    let deadline = if limits.infinite {
        None
    } else if let Some(movetime) = limits.movetime {
        Some(start + movetime)
    } else {
        allocate_base_time(&position, &limits).map(|base| start + base)
    };
    let max_depth = limits.depth.unwrap_or(MAX_NOMINAL_SEARCH_DEPTH).min(MAX_NOMINAL_SEARCH_DEPTH);

    let mut ctx = Ctx {
        params,
        tt: &state.tt,
        eval_cache: &state.eval_cache,
        killers: &mut state.killers,
        history: &mut state.history,
        nodes: 0,
        stop,
        stopped: false,
        start,
        deadline,
        node_limit: limits.nodes,
    };

    let mut best_move = legal.as_slice()[0];
    let mut best_score = 0;
    let mut prev_score = 0i32;

    for depth in 1..=max_depth {
        let mut delta = params.aspiration_delta;
        let (mut alpha, mut beta) = if depth <= 2 {
            (-MATE_VALUE, MATE_VALUE)
        } else {
            (prev_score - delta, prev_score + delta)
        };

        let (score, root_move) = loop {
            let result = search_root(&mut ctx, &mut position, &legal, depth as i32 * ONE_PLY, alpha, beta);
            if ctx.stopped {
                break (prev_score, None);
            }
            match result {
                Some((score, mv)) if score <= alpha => {
                    alpha = (alpha - delta).max(-MATE_VALUE);
                    delta *= 2;
                    let _ = mv;
                }
                Some((score, mv)) if score >= beta => {
                    beta = (beta + delta).min(MATE_VALUE);
                    delta *= 2;
                    let _ = mv;
                }
                Some((score, mv)) => break (score, Some(mv)),
                None => break (prev_score, None),
            }
        };

        if ctx.stopped {
            break;
        }

        if let Some(mv) = root_move {
            best_move = mv;
            best_score = score;
            prev_score = score;

            let mate = if score > MATE_THRESHOLD {
                Some((MATE_VALUE - score + 1) / 2)
            } else if score < -MATE_THRESHOLD {
                Some(-((MATE_VALUE + score + 1) / 2))
            } else {
                None
            };

            observer.on_info(&SearchInfo {
                depth,
                score_cp: score,
                mate,
                nodes: ctx.nodes,
                elapsed: ctx.start.elapsed(),
                pv: extract_pv(&mut position, ctx.tt, depth),
            });
        }

        if let Some(deadline) = ctx.deadline {
            if Instant::now() >= deadline {
                break;
            }
        }
    }

    let _ = best_score;
    Some(best_move)
}

/// Moves-to-go estimate derived from the tapered game phase when the GUI
/// doesn't supply `movestogo`: 40 moves assumed remaining at full opening
/// material, tapering down to a floor of 10 as material comes off.
fn estimated_moves_to_go(phase: i32) -> u32 {
    (40 - (phase.clamp(0, 256) * 30) / 256).max(10) as u32
}

/// Estimated remaining-moves-based time slice for the side to move, per
/// `base = 0.95 * timeLeft / (movesToGo + 1) + (movesToGo - 1) * increment
/// / (movesToGo + 1)`.
fn allocate_base_time(position: &Position, limits: &SearchLimits) -> Option<Duration> {
    let (time_left, increment) = match position.side_to_move {
        chess_core::Color::White => (limits.white_time?, limits.white_increment.unwrap_or_default()),
        chess_core::Color::Black => (limits.black_time?, limits.black_increment.unwrap_or_default()),
    };
    let moves_to_go = limits
        .moves_to_go
        .unwrap_or_else(|| estimated_moves_to_go(crate::eval::game_phase(position)))
        .max(1) as f64;
    let time_left_ms = time_left.as_millis() as f64;
    let inc_ms = increment.as_millis() as f64;

    let base_ms = 0.95 * time_left_ms / (moves_to_go + 1.0)
        + (moves_to_go - 1.0) * inc_ms / (moves_to_go + 1.0);
    Some(Duration::from_millis(base_ms.max(1.0) as u64))
}

/// Reconstructs the principal variation by walking exact TT entries from
/// the root, replaying each move on a scratch position.
fn extract_pv(position: &mut Position, tt: &Tt, max_len: u8) -> Vec<Move> {
    let mut pv = Vec::new();
    for ply in 0..max_len {
        let entry = match tt.probe(position.zobrist_key, ply) {
            Some(e) if e.bound == Bound::Exact => e,
            _ => break,
        };
        let legal = generate_legal_moves(position);
        let mv = match resolve_hash_move(entry.compact_move, &legal) {
            Some(m) => m,
            None => break,
        };
        position.make_move(mv);
        pv.push(mv);
    }
    // Restore the scratch position; PV extraction is read-only to the caller.
    for mv in pv.iter().rev() {
        position.unmake_move(*mv);
    }
    pv
}

/// Searches every root move at `depth`, returning the best (score, move)
/// pair, or `None` if the search was stopped before any move completed.
fn search_root(
    ctx: &mut Ctx,
    position: &mut Position,
    legal: &MoveList,
    depth: i32,
    alpha: i32,
    beta: i32,
) -> Option<(i32, Move)> {
    let mut alpha = alpha;
    let mut best: Option<(i32, Move)> = None;
    let ordered = order_root_moves(position, legal, ctx.history);

    for (i, m) in ordered.iter().enumerate() {
        position.make_move(*m);
        let score = if i == 0 {
            -pvs(ctx, position, depth - ONE_PLY, -beta, -alpha, 1, true, false, None)
        } else {
            let reduced = -pvs(ctx, position, depth - ONE_PLY, -alpha - 1, -alpha, 1, true, false, None);
            if reduced > alpha && reduced < beta {
                -pvs(ctx, position, depth - ONE_PLY, -beta, -alpha, 1, true, false, None)
            } else {
                reduced
            }
        };
        position.unmake_move(*m);

        if ctx.stopped {
            return best;
        }

        if best.is_none() || score > best.unwrap().0 {
            best = Some((score, *m));
        }
        if score > alpha {
            alpha = score;
        }
        if alpha >= beta {
            break;
        }
    }

    best
}

fn order_root_moves(position: &Position, legal: &MoveList, history: &HistoryTable) -> Vec<Move> {
    let mut moves: Vec<Move> = legal.as_slice().to_vec();
    moves.sort_by_key(|m| {
        if is_tactical(*m) {
            -1_000_000 - mvv_lva_value(*m)
        } else {
            -history.weight(m.moved_piece().unwrap(), m.to().index() as usize)
        }
    });
    let _ = position;
    moves
}

/// Fail-soft principal-variation search.
#[allow(clippy::too_many_arguments)]
fn pvs(
    ctx: &mut Ctx,
    position: &mut Position,
    mut depth: i32,
    mut alpha: i32,
    mut beta: i32,
    ply: u8,
    null_allowed: bool,
    prev_was_capture: bool,
    recapture_square: Option<Square>,
) -> i32 {
    ctx.nodes += 1;
    ctx.check_stop();
    if ctx.stopped {
        return 0;
    }

    let is_pv = beta - alpha > 1;

    if ply > 0
        && (position.is_repetition_strict(ply as usize)
            || position.is_repetition(3)
            || position.is_fifty_move_draw())
    {
        return 0;
    }

    // Mate-distance pruning.
    alpha = alpha.max(mate_score(ply));
    beta = beta.min(-mate_score(ply + 1));
    if alpha >= beta {
        return alpha;
    }

    let hash = position.zobrist_key;
    let mut hash_move: Option<Move> = None;
    if let Some(entry) = ctx.tt.probe(hash, ply) {
        if (entry.depth as i32) * ONE_PLY >= depth {
            let cutoff = match entry.bound {
                Bound::Exact => true,
                Bound::LowerBound => entry.score >= beta,
                Bound::UpperBound => entry.score <= alpha,
                Bound::None => false,
            };
            if cutoff && !is_pv {
                return entry.score;
            }
        }
        hash_move = resolve_hash_move_soft(position, entry.compact_move);
        if let Some(hm) = hash_move {
            if !is_tactical(hm) && entry.bound == Bound::LowerBound {
                ctx.killers.record(ply as usize, hm);
            }
        }
    }

    if depth <= 0 {
        return quiescence(ctx, position, alpha, beta, 0);
    }

    let in_check = position.in_check();
    if in_check {
        depth += CHECK_EXTENSION;
    }

    // Internal iterative deepening: no hash move, enough depth, PV node.
    if hash_move.is_none() && is_pv && depth >= ctx.params.iid_min_depth as i32 * ONE_PLY {
        let reduction = ctx.params.iid_reduction as i32 * ONE_PLY;
        pvs(ctx, position, depth - reduction, alpha, beta, ply, false, prev_was_capture, recapture_square);
        if let Some(entry) = ctx.tt.probe(hash, ply) {
            hash_move = resolve_hash_move_soft(position, entry.compact_move);
        }
    }

    let legal = generate_legal_moves(position);
    if legal.is_empty() {
        return if in_check { mate_score(ply) } else { 0 };
    }
    let one_reply = legal.len() == 1;

    // Hash-move search, first and unconditionally full-window.
    let mut best_score = -MATE_VALUE - 1;
    let mut best_move: Option<Move> = None;
    let mut searched: Vec<Move> = Vec::with_capacity(legal.len());

    if let Some(hm) = hash_move {
        if legal.as_slice().contains(&hm) {
            let extension = if recapture_square == Some(hm.to()) && hm.is_capture() {
                RECAPTURE_EXTENSION
            } else {
                0
            } + if one_reply { ONE_REPLY_EXTENSION } else { 0 };

            position.make_move(hm);
            let gives_check = position.in_check();
            let score = -pvs(
                ctx,
                position,
                depth - ONE_PLY + extension,
                -beta,
                -alpha,
                ply + 1,
                true,
                hm.is_capture(),
                if hm.is_capture() { Some(hm.to()) } else { None },
            );
            position.unmake_move(hm);
            let _ = gives_check;

            if ctx.stopped {
                return 0;
            }
            best_score = score;
            best_move = Some(hm);
            if score > alpha {
                alpha = score;
            }
            searched.push(hm);
            if alpha >= beta {
                store_tt(ctx, hash, depth, alpha, beta, best_score, hm, ply);
                if !hm.is_capture() {
                    ctx.killers.record(ply as usize, hm);
                    ctx.history.record_cutoff(hm.moved_piece().unwrap(), hm.to().index() as usize, depth / ONE_PLY);
                }
                return best_score;
            }
        }
    }

    // Null-move pruning.
    if null_allowed
        && !in_check
        && !is_pv
        && depth >= ctx.params.null_move_min_depth as i32 * ONE_PLY
        && has_non_pawn_material(position, position.side_to_move)
    {
        let reduction = (ctx.params.null_move_reduction as i32 + 1) * ONE_PLY;
        position.make_null_move();
        let score = -pvs(ctx, position, depth - reduction, -beta, -beta + 1, ply + 1, false, false, None);
        position.unmake_null_move();

        if ctx.stopped {
            return 0;
        }
        if score >= beta {
            return score;
        }
        if score < -MATE_THRESHOLD {
            depth += MATE_THREAT_EXTENSION;
        }
    }

    let mut tactical: Vec<Move> = legal
        .as_slice()
        .iter()
        .copied()
        .filter(|m| is_tactical(*m) && Some(*m) != hash_move)
        .collect();
    tactical.sort_by_key(|m| -mvv_lva_value(*m));
    let (winning, losing): (Vec<Move>, Vec<Move>) =
        tactical.into_iter().partition(|m| mvv_lva_value(*m) >= 0);

    let killer_moves = ctx.killers.get(ply as usize);
    let mut quiet: Vec<Move> = legal
        .as_slice()
        .iter()
        .copied()
        .filter(|m| !is_tactical(*m) && Some(*m) != hash_move && !killer_moves.contains(&Some(*m)))
        .collect();
    quiet.sort_by_key(|m| -ctx.history.weight(m.moved_piece().unwrap(), m.to().index() as usize));

    let stages: Vec<(Move, bool)> = winning
        .into_iter()
        .map(|m| (m, false))
        .chain(
            killer_moves
                .into_iter()
                .flatten()
                .filter(|m| legal.as_slice().contains(m) && Some(*m) != hash_move)
                .map(|m| (m, false)),
        )
        .chain(losing.into_iter().map(|m| (m, false)))
        .chain(quiet.into_iter().map(|m| (m, true)))
        .collect();

    let static_eval = evaluate(position, ctx.params, ctx.eval_cache, alpha, beta);

    for (m, is_quiet) in stages {
        if searched.contains(&m) {
            continue;
        }
        let depth_plies = depth / ONE_PLY;

        if is_quiet && !is_pv && !in_check && prev_was_capture && depth_plies >= 1 && depth_plies <= 3 {
            position.make_move(m);
            let gives_check = position.in_check();
            position.unmake_move(m);
            if !gives_check {
                match depth_plies {
                    1 if static_eval + ctx.params.futility_margin_1 <= alpha => {
                        searched.push(m);
                        continue;
                    }
                    2 if static_eval + ctx.params.futility_margin_2 <= alpha => {
                        searched.push(m);
                        continue;
                    }
                    _ => {}
                }
            }
        }

        let mut move_depth = depth - ONE_PLY;
        if is_quiet
            && !is_pv
            && !in_check
            && depth_plies == 3
            && static_eval + ctx.params.razoring_margin_3 <= alpha
        {
            move_depth -= ONE_PLY;
        }

        let extension =
            if recapture_square == Some(m.to()) && m.is_capture() { RECAPTURE_EXTENSION } else { 0 }
                + if one_reply { ONE_REPLY_EXTENSION } else { 0 };
        move_depth += extension;

        let moves_searched = searched.len();
        let mut reduction = 0;
        if is_quiet
            && !is_pv
            && !in_check
            && depth_plies > 2
            && alpha.abs() < MATE_THRESHOLD
            && moves_searched as u8 > ctx.params.late_move_threshold
        {
            reduction = ctx.params.late_move_reduction as i32 * ONE_PLY;
        }

        position.make_move(m);
        let gives_check = position.in_check();
        if gives_check {
            reduction = 0;
        }
        let next_recapture = if m.is_capture() { Some(m.to()) } else { None };

        let mut score = -pvs(
            ctx,
            position,
            move_depth - reduction,
            -alpha - 1,
            -alpha,
            ply + 1,
            true,
            m.is_capture(),
            next_recapture,
        );
        if reduction > 0 && score > alpha {
            score = -pvs(ctx, position, move_depth, -alpha - 1, -alpha, ply + 1, true, m.is_capture(), next_recapture);
        }
        if score > alpha && score < beta {
            score = -pvs(ctx, position, move_depth, -beta, -alpha, ply + 1, true, m.is_capture(), next_recapture);
        }
        position.unmake_move(m);

        searched.push(m);

        if ctx.stopped {
            return 0;
        }

        if score > best_score {
            best_score = score;
            best_move = Some(m);
        }
        if score > alpha {
            alpha = score;
        }
        if alpha >= beta {
            if is_quiet {
                ctx.killers.record(ply as usize, m);
                ctx.history.record_cutoff(m.moved_piece().unwrap(), m.to().index() as usize, depth_plies);
            }
            break;
        }
        if is_quiet {
            ctx.history.record_miss(m.moved_piece().unwrap(), m.to().index() as usize, depth_plies);
        }
    }

    if let Some(bm) = best_move {
        store_tt(ctx, hash, depth, alpha, beta, best_score, bm, ply);
    }
    best_score
}

fn store_tt(ctx: &mut Ctx, hash: u64, depth: i32, alpha: i32, beta: i32, score: i32, best_move: Move, ply: u8) {
    let depth_plies = (depth / ONE_PLY).clamp(0, 127) as u8;
    let bound = if score <= alpha {
        Bound::UpperBound
    } else if score >= beta {
        Bound::LowerBound
    } else {
        Bound::Exact
    };
    ctx.tt.store(hash, depth_plies, bound, score, best_move, ply);
}

/// Quiescence search: resolves tactical sequences at the search frontier so
/// the static evaluator is never asked to judge a position with a hanging
/// capture on the board.
fn quiescence(ctx: &mut Ctx, position: &mut Position, mut alpha: i32, beta: i32, qply: i32) -> i32 {
    ctx.nodes += 1;
    ctx.check_stop();
    if ctx.stopped {
        return 0;
    }

    if position.in_check() {
        // One-ply check-evasion extension, not recorded in the TT: pass a
        // negative ply marker by simply not probing/storing here and
        // delegating straight to the main search for one full ply.
        return pvs(ctx, position, ONE_PLY, alpha, beta, (qply.unsigned_abs() as u8).saturating_add(1), false, false, None);
    }

    let stand_pat = evaluate(position, ctx.params, ctx.eval_cache, alpha, beta);
    if stand_pat >= beta {
        return stand_pat;
    }
    if stand_pat > alpha {
        alpha = stand_pat;
    }
    if qply.unsigned_abs() as u8 >= ctx.params.max_quiescence_ply {
        return stand_pat;
    }

    let tactical = generate_tactical(position);
    let mut moves: Vec<(Move, i32)> = tactical.as_slice().iter().map(|&m| (m, see(position, m))).collect();
    moves.sort_by_key(|(_, s)| -s);

    for (m, see_value) in moves {
        if see_value < 0 {
            break;
        }
        if stand_pat + see_value + ctx.params.quiescence_delta <= alpha {
            continue;
        }

        position.make_move(m);
        let score = -quiescence(ctx, position, -beta, -alpha, qply - 1);
        position.unmake_move(m);

        if ctx.stopped {
            return 0;
        }
        if score >= beta {
            return score;
        }
        if score > alpha {
            alpha = score;
        }
    }

    alpha
}
