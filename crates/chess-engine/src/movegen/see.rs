//! Static Exchange Evaluation (SEE).
//!
//! Estimates the material result of a sequence of captures on a single
//! square using the classic swap-list algorithm: repeatedly "capture" with
//! the least valuable attacker of each side in turn and back-propagate the
//! best achievable result through the exchange, exactly as described on the
//! Chess Programming Wiki's SEE page.
//!
//! This does not account for absolute pins: an attacker pinned to its own
//! king along a ray other than the one running through the capture square
//! is still treated as available. Filtering pinned attackers out correctly
//! requires re-deriving the pin for every intermediate occupancy in the
//! exchange, which costs far more than the ordering/pruning signal SEE
//! exists to provide is worth. Engines commonly accept this approximation.

use crate::movegen::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks};
use crate::{Bitboard, Position};
use chess_core::{Color, Move, MoveFlag, Piece, Square};

const fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 100,
        Piece::Knight => 320,
        Piece::Bishop => 330,
        Piece::Rook => 500,
        Piece::Queen => 900,
        Piece::King => 20_000,
    }
}

/// Returns every piece (either color) attacking `sq` given the occupancy
/// `occ`. Unlike [`Position::attackers_of`], this takes occupancy explicitly
/// so the swap loop can remove pieces as the exchange progresses and reveal
/// attackers behind them.
fn attackers_to(position: &Position, sq: Square, occ: Bitboard) -> Bitboard {
    let mut attackers = Bitboard::EMPTY;

    attackers |= knight_attacks(sq)
        & (position.pieces_of(Piece::Knight, Color::White) | position.pieces_of(Piece::Knight, Color::Black));
    attackers |= king_attacks(sq)
        & (position.pieces_of(Piece::King, Color::White) | position.pieces_of(Piece::King, Color::Black));
    attackers |= pawn_attacks(sq, Color::Black) & position.pieces_of(Piece::Pawn, Color::White);
    attackers |= pawn_attacks(sq, Color::White) & position.pieces_of(Piece::Pawn, Color::Black);

    let diag_sliders = position.pieces_of(Piece::Bishop, Color::White)
        | position.pieces_of(Piece::Bishop, Color::Black)
        | position.pieces_of(Piece::Queen, Color::White)
        | position.pieces_of(Piece::Queen, Color::Black);
    attackers |= bishop_attacks(sq, occ) & diag_sliders;

    let orth_sliders = position.pieces_of(Piece::Rook, Color::White)
        | position.pieces_of(Piece::Rook, Color::Black)
        | position.pieces_of(Piece::Queen, Color::White)
        | position.pieces_of(Piece::Queen, Color::Black);
    attackers |= rook_attacks(sq, occ) & orth_sliders;

    attackers & occ
}

fn piece_on(position: &Position, sq: Square) -> Option<Piece> {
    position.piece_at(sq).map(|(p, _)| p)
}

/// Returns the square and type of the cheapest piece of `color` within
/// `attackers`.
fn least_valuable_attacker(position: &Position, attackers: Bitboard, color: Color) -> Option<(Square, Piece)> {
    let mut best: Option<(Square, Piece)> = None;
    for sq in attackers & position.colors[color.index()] {
        let piece = piece_on(position, sq).expect("attacker occupies its square");
        if best.map(|(_, bp)| piece_value(piece) < piece_value(bp)).unwrap_or(true) {
            best = Some((sq, piece));
        }
    }
    best
}

/// Runs the static exchange evaluation for `m` and returns the net material
/// gain (in centipawns, from the perspective of the side making `m`) if both
/// sides trade optimally on the destination square.
pub fn see(position: &Position, m: Move) -> i32 {
    let to = m.to();
    let from = m.from();
    let mut side = position.side_to_move.opposite();
    let mut occ = position.occupied();

    let mut gain = [0i32; 32];
    let mut depth = 0usize;

    let initial_captured = if m.flag() == MoveFlag::EnPassant {
        Some(Piece::Pawn)
    } else {
        m.captured_piece().or_else(|| piece_on(position, to))
    };
    gain[0] = initial_captured.map(piece_value).unwrap_or(0);

    let mut attacker_value = m
        .moved_piece()
        .or_else(|| piece_on(position, from))
        .map(piece_value)
        .unwrap_or(0);

    occ.clear(from);
    if m.flag() == MoveFlag::EnPassant {
        let captured_sq = unsafe {
            Square::from_index_unchecked((from.rank().index() * 8 + to.file().index()) as u8)
        };
        occ.clear(captured_sq);
    }

    let mut attackers = attackers_to(position, to, occ);

    loop {
        depth += 1;
        gain[depth] = attacker_value - gain[depth - 1];
        if gain[depth].max(-gain[depth - 1]) < 0 {
            break;
        }

        match least_valuable_attacker(position, attackers, side) {
            None => break,
            Some((sq, piece)) => {
                attacker_value = piece_value(piece);
                occ.clear(sq);
                attackers = attackers_to(position, to, occ);
                side = side.opposite();
            }
        }

        if depth >= 31 {
            break;
        }
    }

    while depth > 0 {
        depth -= 1;
        gain[depth] = -(-gain[depth]).max(gain[depth + 1]);
    }

    gain[0]
}

/// Returns true if SEE judges `m` to be at least neutral (a reasonable
/// capture to try before quiet moves in move ordering).
pub fn see_ge(position: &Position, m: Move, threshold: i32) -> bool {
    see(position, m) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::MoveFlag;

    #[test]
    fn pawn_takes_undefended_pawn_wins_material() {
        let position = Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let m = Move::new(Square::E4, Square::D5, MoveFlag::Normal, Piece::Pawn, Some(Piece::Pawn));
        assert_eq!(see(&position, m), piece_value(Piece::Pawn));
    }

    #[test]
    fn losing_capture_is_negative() {
        // White queen takes a pawn defended by a black pawn: loses the queen
        // for a pawn.
        let position = Position::from_fen("4k3/8/2p5/3p4/8/8/8/3QK3 w - - 0 1").unwrap();
        let m = Move::new(Square::D1, Square::D5, MoveFlag::Normal, Piece::Queen, Some(Piece::Pawn));
        assert!(see(&position, m) < 0);
    }

    #[test]
    fn equal_trade_is_zero_or_better() {
        let position = Position::from_fen("4k3/8/8/3r4/8/8/8/3RK3 w - - 0 1").unwrap();
        let m = Move::new(Square::D1, Square::D5, MoveFlag::Normal, Piece::Rook, Some(Piece::Rook));
        assert_eq!(see(&position, m), piece_value(Piece::Rook));
    }

    #[test]
    fn see_ge_threshold() {
        let position = Position::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let m = Move::new(Square::E4, Square::D5, MoveFlag::Normal, Piece::Pawn, Some(Piece::Pawn));
        assert!(see_ge(&position, m, 0));
        assert!(!see_ge(&position, m, piece_value(Piece::Pawn) + 1));
    }
}
