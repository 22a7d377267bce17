//! Move representation.

use crate::{Piece, Square};
use std::fmt;

/// Flags for special move types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveFlag {
    /// Normal move (no special action).
    Normal = 0,
    /// Pawn double push from starting rank.
    DoublePush = 1,
    /// Kingside castling (O-O).
    CastleKingside = 2,
    /// Queenside castling (O-O-O).
    CastleQueenside = 3,
    /// En passant capture.
    EnPassant = 4,
    /// Pawn promotion to knight.
    PromoteKnight = 5,
    /// Pawn promotion to bishop.
    PromoteBishop = 6,
    /// Pawn promotion to rook.
    PromoteRook = 7,
    /// Pawn promotion to queen.
    PromoteQueen = 8,
}

impl MoveFlag {
    /// Returns the promotion piece if this is a promotion move.
    #[inline]
    pub const fn promotion_piece(self) -> Option<Piece> {
        match self {
            MoveFlag::PromoteKnight => Some(Piece::Knight),
            MoveFlag::PromoteBishop => Some(Piece::Bishop),
            MoveFlag::PromoteRook => Some(Piece::Rook),
            MoveFlag::PromoteQueen => Some(Piece::Queen),
            _ => None,
        }
    }

    /// Returns true if this is a promotion move.
    #[inline]
    pub const fn is_promotion(self) -> bool {
        matches!(
            self,
            MoveFlag::PromoteKnight
                | MoveFlag::PromoteBishop
                | MoveFlag::PromoteRook
                | MoveFlag::PromoteQueen
        )
    }

    /// Returns true if this is a castling move.
    #[inline]
    pub const fn is_castling(self) -> bool {
        matches!(self, MoveFlag::CastleKingside | MoveFlag::CastleQueenside)
    }
}

/// Sentinel stored in the piece fields of [`Move`] when no piece applies
/// (captured-piece field on a non-capture, or either field on [`Move::NULL`]).
const NO_PIECE: u32 = 7;

const fn piece_to_bits(p: Option<Piece>) -> u32 {
    match p {
        Some(p) => p.index() as u32,
        None => NO_PIECE,
    }
}

const fn bits_to_piece(bits: u32) -> Option<Piece> {
    match bits {
        0 => Some(Piece::Pawn),
        1 => Some(Piece::Knight),
        2 => Some(Piece::Bishop),
        3 => Some(Piece::Rook),
        4 => Some(Piece::Queen),
        5 => Some(Piece::King),
        _ => None,
    }
}

/// A chess move.
///
/// Encoded compactly into 22 of 32 bits: 6 bits from, 6 bits to, 4 bits flag,
/// 3 bits moved piece, 3 bits captured piece (`7` = none). Packing the moved
/// and captured piece into the move itself lets the transposition table and
/// the static-exchange evaluator read them without a position lookup.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move(u32);

impl Move {
    /// Creates a new move, recording the piece that moved and (if any) the
    /// piece it captured.
    #[inline]
    pub const fn new(
        from: Square,
        to: Square,
        flag: MoveFlag,
        moved: Piece,
        captured: Option<Piece>,
    ) -> Self {
        let encoded = (from.index() as u32)
            | ((to.index() as u32) << 6)
            | ((flag as u32) << 12)
            | (piece_to_bits(Some(moved)) << 16)
            | (piece_to_bits(captured) << 19);
        Move(encoded)
    }

    /// Creates a move without piece metadata, for contexts (UCI parsing)
    /// where the moved/captured piece isn't yet known. Such a move should
    /// only be used to match against a fully-populated move from a legal
    /// move list, never stored in a transposition table.
    #[inline]
    pub const fn bare(from: Square, to: Square, flag: MoveFlag) -> Self {
        let encoded = (from.index() as u32)
            | ((to.index() as u32) << 6)
            | ((flag as u32) << 12)
            | (NO_PIECE << 16)
            | (NO_PIECE << 19);
        Move(encoded)
    }

    /// Creates a normal move (no special flags, no piece metadata).
    #[inline]
    pub const fn normal(from: Square, to: Square) -> Self {
        Self::bare(from, to, MoveFlag::Normal)
    }

    /// Returns the source square.
    #[inline]
    pub const fn from(self) -> Square {
        // SAFETY: masked to 6 bits, always valid square index
        unsafe { Square::from_index_unchecked((self.0 & 0x3F) as u8) }
    }

    /// Returns the destination square.
    #[inline]
    pub const fn to(self) -> Square {
        // SAFETY: masked to 6 bits, always valid square index
        unsafe { Square::from_index_unchecked(((self.0 >> 6) & 0x3F) as u8) }
    }

    /// Returns the move flag.
    #[inline]
    pub const fn flag(self) -> MoveFlag {
        match (self.0 >> 12) & 0xF {
            0 => MoveFlag::Normal,
            1 => MoveFlag::DoublePush,
            2 => MoveFlag::CastleKingside,
            3 => MoveFlag::CastleQueenside,
            4 => MoveFlag::EnPassant,
            5 => MoveFlag::PromoteKnight,
            6 => MoveFlag::PromoteBishop,
            7 => MoveFlag::PromoteRook,
            8 => MoveFlag::PromoteQueen,
            _ => MoveFlag::Normal, // Should never happen
        }
    }

    /// Returns the piece that moved, if known.
    #[inline]
    pub const fn moved_piece(self) -> Option<Piece> {
        bits_to_piece((self.0 >> 16) & 0x7)
    }

    /// Returns the piece captured by this move, if any.
    ///
    /// For en passant, this is always [`Piece::Pawn`] even though the
    /// captured pawn does not sit on the destination square.
    #[inline]
    pub const fn captured_piece(self) -> Option<Piece> {
        bits_to_piece((self.0 >> 19) & 0x7)
    }

    /// Returns true if this move captures a piece (including en passant).
    #[inline]
    pub const fn is_capture(self) -> bool {
        self.captured_piece().is_some() || matches!(self.flag(), MoveFlag::EnPassant)
    }

    /// Returns the raw 32-bit encoding, suitable for packing into a
    /// transposition-table entry.
    #[inline]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Reconstructs a move from its raw 32-bit encoding.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Move(bits)
    }

    /// Returns the UCI notation for this move (e.g., "e2e4", "e7e8q").
    pub fn to_uci(self) -> String {
        let promo = match self.flag() {
            MoveFlag::PromoteKnight => "n",
            MoveFlag::PromoteBishop => "b",
            MoveFlag::PromoteRook => "r",
            MoveFlag::PromoteQueen => "q",
            _ => "",
        };
        format!("{}{}{}", self.from(), self.to(), promo)
    }

    /// Parses a move from UCI notation.
    ///
    /// This produces a bare move (no piece metadata, castling/en-passant
    /// flags not inferred). Callers must resolve it against a legal move
    /// list (matching on from/to/promotion) to get a fully-populated move.
    pub fn from_uci(s: &str) -> Option<Self> {
        if s.len() < 4 || s.len() > 5 {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let flag = if s.len() == 5 {
            match s.chars().nth(4)? {
                'n' | 'N' => MoveFlag::PromoteKnight,
                'b' | 'B' => MoveFlag::PromoteBishop,
                'r' | 'R' => MoveFlag::PromoteRook,
                'q' | 'Q' => MoveFlag::PromoteQueen,
                _ => return None,
            }
        } else {
            MoveFlag::Normal
        };
        Some(Move::bare(from, to, flag))
    }

    /// A null move (used as placeholder / for the null-move search heuristic,
    /// not a legal move).
    pub const NULL: Move = Move(0 | (NO_PIECE << 16) | (NO_PIECE << 19));
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({})", self.to_uci())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{File, Rank};

    #[test]
    fn move_encoding() {
        let e2 = Square::new(File::E, Rank::R2);
        let e4 = Square::new(File::E, Rank::R4);
        let m = Move::new(e2, e4, MoveFlag::DoublePush, Piece::Pawn, None);

        assert_eq!(m.from(), e2);
        assert_eq!(m.to(), e4);
        assert_eq!(m.flag(), MoveFlag::DoublePush);
        assert_eq!(m.moved_piece(), Some(Piece::Pawn));
        assert_eq!(m.captured_piece(), None);
        assert!(!m.is_capture());
    }

    #[test]
    fn move_capture_roundtrip() {
        let d4 = Square::new(File::D, Rank::R4);
        let e5 = Square::new(File::E, Rank::R5);
        let m = Move::new(d4, e5, MoveFlag::Normal, Piece::Bishop, Some(Piece::Pawn));
        assert_eq!(m.moved_piece(), Some(Piece::Bishop));
        assert_eq!(m.captured_piece(), Some(Piece::Pawn));
        assert!(m.is_capture());

        let bits = m.to_bits();
        let restored = Move::from_bits(bits);
        assert_eq!(restored, m);
    }

    #[test]
    fn move_en_passant_is_capture() {
        let e5 = Square::new(File::E, Rank::R5);
        let d6 = Square::new(File::D, Rank::R6);
        let m = Move::new(e5, d6, MoveFlag::EnPassant, Piece::Pawn, Some(Piece::Pawn));
        assert!(m.is_capture());
    }

    #[test]
    fn move_uci() {
        let e2 = Square::new(File::E, Rank::R2);
        let e4 = Square::new(File::E, Rank::R4);
        let m = Move::normal(e2, e4);
        assert_eq!(m.to_uci(), "e2e4");

        let e7 = Square::new(File::E, Rank::R7);
        let e8 = Square::new(File::E, Rank::R8);
        let promo = Move::new(e7, e8, MoveFlag::PromoteQueen, Piece::Pawn, None);
        assert_eq!(promo.to_uci(), "e7e8q");
    }

    #[test]
    fn move_from_uci() {
        let m = Move::from_uci("e2e4").unwrap();
        assert_eq!(m.from().to_algebraic(), "e2");
        assert_eq!(m.to().to_algebraic(), "e4");

        let promo = Move::from_uci("e7e8q").unwrap();
        assert_eq!(promo.flag(), MoveFlag::PromoteQueen);

        assert!(Move::from_uci("invalid").is_none());
        assert!(Move::from_uci("e2e9").is_none());
    }

    #[test]
    fn move_flag_promotion_piece() {
        assert_eq!(MoveFlag::Normal.promotion_piece(), None);
        assert_eq!(MoveFlag::DoublePush.promotion_piece(), None);
        assert_eq!(MoveFlag::CastleKingside.promotion_piece(), None);
        assert_eq!(MoveFlag::CastleQueenside.promotion_piece(), None);
        assert_eq!(MoveFlag::EnPassant.promotion_piece(), None);
        assert_eq!(MoveFlag::PromoteKnight.promotion_piece(), Some(Piece::Knight));
        assert_eq!(MoveFlag::PromoteBishop.promotion_piece(), Some(Piece::Bishop));
        assert_eq!(MoveFlag::PromoteRook.promotion_piece(), Some(Piece::Rook));
        assert_eq!(MoveFlag::PromoteQueen.promotion_piece(), Some(Piece::Queen));
    }

    #[test]
    fn move_flag_is_promotion() {
        assert!(!MoveFlag::Normal.is_promotion());
        assert!(!MoveFlag::DoublePush.is_promotion());
        assert!(!MoveFlag::CastleKingside.is_promotion());
        assert!(!MoveFlag::EnPassant.is_promotion());
        assert!(MoveFlag::PromoteKnight.is_promotion());
        assert!(MoveFlag::PromoteBishop.is_promotion());
        assert!(MoveFlag::PromoteRook.is_promotion());
        assert!(MoveFlag::PromoteQueen.is_promotion());
    }

    #[test]
    fn move_flag_is_castling() {
        assert!(!MoveFlag::Normal.is_castling());
        assert!(!MoveFlag::DoublePush.is_castling());
        assert!(MoveFlag::CastleKingside.is_castling());
        assert!(MoveFlag::CastleQueenside.is_castling());
        assert!(!MoveFlag::EnPassant.is_castling());
        assert!(!MoveFlag::PromoteQueen.is_castling());
    }

    #[test]
    fn move_all_promotions_uci() {
        let e7 = Square::new(File::E, Rank::R7);
        let e8 = Square::new(File::E, Rank::R8);

        assert_eq!(
            Move::new(e7, e8, MoveFlag::PromoteKnight, Piece::Pawn, None).to_uci(),
            "e7e8n"
        );
        assert_eq!(
            Move::new(e7, e8, MoveFlag::PromoteBishop, Piece::Pawn, None).to_uci(),
            "e7e8b"
        );
        assert_eq!(
            Move::new(e7, e8, MoveFlag::PromoteRook, Piece::Pawn, None).to_uci(),
            "e7e8r"
        );
        assert_eq!(
            Move::new(e7, e8, MoveFlag::PromoteQueen, Piece::Pawn, None).to_uci(),
            "e7e8q"
        );
    }

    #[test]
    fn move_from_uci_all_promotions() {
        assert_eq!(Move::from_uci("e7e8n").unwrap().flag(), MoveFlag::PromoteKnight);
        assert_eq!(Move::from_uci("e7e8N").unwrap().flag(), MoveFlag::PromoteKnight);
        assert_eq!(Move::from_uci("e7e8b").unwrap().flag(), MoveFlag::PromoteBishop);
        assert_eq!(Move::from_uci("e7e8B").unwrap().flag(), MoveFlag::PromoteBishop);
        assert_eq!(Move::from_uci("e7e8r").unwrap().flag(), MoveFlag::PromoteRook);
        assert_eq!(Move::from_uci("e7e8R").unwrap().flag(), MoveFlag::PromoteRook);
        assert_eq!(Move::from_uci("e7e8q").unwrap().flag(), MoveFlag::PromoteQueen);
        assert_eq!(Move::from_uci("e7e8Q").unwrap().flag(), MoveFlag::PromoteQueen);
        // Invalid promotion character
        assert!(Move::from_uci("e7e8x").is_none());
    }

    #[test]
    fn move_null() {
        let null = Move::NULL;
        assert_eq!(null.from().index(), 0);
        assert_eq!(null.to().index(), 0);
        assert_eq!(null.moved_piece(), None);
        assert_eq!(null.captured_piece(), None);
    }

    #[test]
    fn move_debug_display() {
        let e2 = Square::new(File::E, Rank::R2);
        let e4 = Square::new(File::E, Rank::R4);
        let m = Move::normal(e2, e4);
        assert_eq!(format!("{:?}", m), "Move(e2e4)");
        assert_eq!(format!("{}", m), "e2e4");
    }

    #[test]
    fn move_from_uci_edge_cases() {
        // Too short
        assert!(Move::from_uci("e2").is_none());
        assert!(Move::from_uci("e2e").is_none());
        // Too long
        assert!(Move::from_uci("e2e4qq").is_none());
    }

    #[test]
    fn move_bare_has_no_piece_metadata() {
        let e2 = Square::new(File::E, Rank::R2);
        let e4 = Square::new(File::E, Rank::R4);
        let m = Move::bare(e2, e4, MoveFlag::Normal);
        assert_eq!(m.moved_piece(), None);
        assert_eq!(m.captured_piece(), None);
    }
}
