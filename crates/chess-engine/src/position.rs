//! Chess position representation and in-place make/unmake.

use chess_core::{Color, FenError, FenParser, Move, MoveFlag, Piece, Square};

use crate::movegen::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks};
use crate::zobrist::ZOBRIST;
use crate::Bitboard;

/// Castling rights flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights(0);
    pub const WHITE_KINGSIDE: u8 = 0b0001;
    pub const WHITE_QUEENSIDE: u8 = 0b0010;
    pub const BLACK_KINGSIDE: u8 = 0b0100;
    pub const BLACK_QUEENSIDE: u8 = 0b1000;
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    /// Creates new castling rights from flags.
    #[inline]
    pub const fn new(flags: u8) -> Self {
        CastlingRights(flags & 0b1111)
    }

    /// Returns true if the given side can castle kingside.
    #[inline]
    pub const fn can_castle_kingside(self, color: Color) -> bool {
        let flag = match color {
            Color::White => Self::WHITE_KINGSIDE,
            Color::Black => Self::BLACK_KINGSIDE,
        };
        (self.0 & flag) != 0
    }

    /// Returns true if the given side can castle queenside.
    #[inline]
    pub const fn can_castle_queenside(self, color: Color) -> bool {
        let flag = match color {
            Color::White => Self::WHITE_QUEENSIDE,
            Color::Black => Self::BLACK_QUEENSIDE,
        };
        (self.0 & flag) != 0
    }

    /// Removes castling rights for a color.
    #[inline]
    pub fn remove_color(&mut self, color: Color) {
        let mask = match color {
            Color::White => !(Self::WHITE_KINGSIDE | Self::WHITE_QUEENSIDE),
            Color::Black => !(Self::BLACK_KINGSIDE | Self::BLACK_QUEENSIDE),
        };
        self.0 &= mask;
    }

    /// Removes kingside castling for a color.
    #[inline]
    pub fn remove_kingside(&mut self, color: Color) {
        let mask = match color {
            Color::White => !Self::WHITE_KINGSIDE,
            Color::Black => !Self::BLACK_KINGSIDE,
        };
        self.0 &= mask;
    }

    /// Removes queenside castling for a color.
    #[inline]
    pub fn remove_queenside(&mut self, color: Color) {
        let mask = match color {
            Color::White => !Self::WHITE_QUEENSIDE,
            Color::Black => !Self::BLACK_QUEENSIDE,
        };
        self.0 &= mask;
    }

    /// Returns the raw flags.
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Iterates over the bit indices (0-3) of the rights currently set.
    #[inline]
    pub fn bits(self) -> impl Iterator<Item = usize> {
        (0..4).filter(move |b| (self.0 & (1 << b)) != 0)
    }
}

/// Saved state needed to undo a single [`Move`].
#[derive(Debug, Clone, Copy)]
struct UndoRecord {
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    checkers: Bitboard,
    zobrist_key: u64,
    captured: Option<Piece>,
}

/// Complete, in-place-mutable chess position state.
///
/// Unlike a clone-and-return move applicator, [`Position::make_move`] mutates
/// the position directly and pushes an [`UndoRecord`] that
/// [`Position::unmake_move`] consumes to restore the prior state exactly.
/// This is the shape a search that visits millions of nodes per second
/// needs: no allocation on the hot path beyond the undo-stack push, which
/// amortizes to O(1).
#[derive(Debug, Clone)]
pub struct Position {
    /// Bitboards for each piece type, indexed by Piece enum.
    pub pieces: [Bitboard; 6],
    /// Bitboards for each color's pieces.
    pub colors: [Bitboard; 2],
    /// Mailbox lookup, kept coherent with the bitboards on every mutation.
    board: [Option<(Piece, Color)>; 64],
    /// The side to move.
    pub side_to_move: Color,
    /// Castling rights.
    pub castling: CastlingRights,
    /// En passant target square (if any).
    pub en_passant: Option<Square>,
    /// Halfmove clock for the fifty-move rule.
    pub halfmove_clock: u32,
    /// Fullmove number (starts at 1, increments after Black's move).
    pub fullmove_number: u32,
    /// Incrementally maintained Zobrist key.
    pub zobrist_key: u64,
    /// Bitboard of enemy pieces currently giving check to the side to move.
    pub checkers: Bitboard,
    /// Zobrist keys of every position reached since the last irreversible
    /// move (capture, pawn move, castle, or loss of castling rights), used
    /// for repetition detection.
    key_history: Vec<u64>,
    undo_stack: Vec<UndoRecord>,
}

impl Position {
    /// Creates an empty position.
    pub fn empty() -> Self {
        Position {
            pieces: [Bitboard::EMPTY; 6],
            colors: [Bitboard::EMPTY; 2],
            board: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            zobrist_key: 0,
            checkers: Bitboard::EMPTY,
            key_history: Vec::with_capacity(64),
            undo_stack: Vec::with_capacity(64),
        }
    }

    /// Creates the standard starting position.
    pub fn startpos() -> Self {
        Self::from_fen(FenParser::STARTPOS).expect("STARTPOS is valid")
    }

    /// Creates a position from a FEN string (6-field or 4-field).
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let parsed = FenParser::parse(fen)?;
        let mut position = Position::empty();

        let ranks: Vec<&str> = parsed.piece_placement.split('/').collect();
        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_idx; // FEN starts from rank 8
            let mut file = 0usize;

            for c in rank_str.chars() {
                if let Some(digit) = c.to_digit(10) {
                    file += digit as usize;
                } else if let Some((piece, color)) = Piece::from_fen_char(c) {
                    let sq = unsafe { Square::from_index_unchecked((rank * 8 + file) as u8) };
                    position.pieces[piece.index()].set(sq);
                    position.colors[color.index()].set(sq);
                    position.board[sq.index() as usize] = Some((piece, color));
                    file += 1;
                }
            }
        }

        position.side_to_move = match parsed.active_color {
            'w' => Color::White,
            'b' => Color::Black,
            _ => unreachable!("FEN parser validated this"),
        };

        let mut castling = 0u8;
        for c in parsed.castling.chars() {
            match c {
                'K' => castling |= CastlingRights::WHITE_KINGSIDE,
                'Q' => castling |= CastlingRights::WHITE_QUEENSIDE,
                'k' => castling |= CastlingRights::BLACK_KINGSIDE,
                'q' => castling |= CastlingRights::BLACK_QUEENSIDE,
                _ => {}
            }
        }
        position.castling = CastlingRights::new(castling);

        position.en_passant = if parsed.en_passant == "-" {
            None
        } else {
            Square::from_algebraic(&parsed.en_passant)
        };

        position.halfmove_clock = parsed.halfmove_clock;
        position.fullmove_number = parsed.fullmove_number;

        position.zobrist_key = position.compute_zobrist_key();
        position.checkers = position.attackers_of(
            position.king_square(position.side_to_move),
            position.side_to_move.opposite(),
        );
        position.key_history.push(position.zobrist_key);

        Ok(position)
    }

    /// Converts the position to a FEN string.
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();

        for rank in (0..8).rev() {
            let mut empty_count = 0;
            for file in 0..8 {
                let sq = unsafe { Square::from_index_unchecked(rank * 8 + file) };
                if let Some((piece, color)) = self.piece_at(sq) {
                    if empty_count > 0 {
                        fen.push_str(&empty_count.to_string());
                        empty_count = 0;
                    }
                    fen.push(piece.to_fen_char(color));
                } else {
                    empty_count += 1;
                }
            }
            if empty_count > 0 {
                fen.push_str(&empty_count.to_string());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        });

        fen.push(' ');
        if self.castling.raw() == 0 {
            fen.push('-');
        } else {
            if self.castling.can_castle_kingside(Color::White) {
                fen.push('K');
            }
            if self.castling.can_castle_queenside(Color::White) {
                fen.push('Q');
            }
            if self.castling.can_castle_kingside(Color::Black) {
                fen.push('k');
            }
            if self.castling.can_castle_queenside(Color::Black) {
                fen.push('q');
            }
        }

        fen.push(' ');
        match self.en_passant {
            Some(sq) => fen.push_str(&sq.to_algebraic()),
            None => fen.push('-'),
        }

        fen.push(' ');
        fen.push_str(&self.halfmove_clock.to_string());
        fen.push(' ');
        fen.push_str(&self.fullmove_number.to_string());

        fen
    }

    /// Returns the piece and color at the given square, if any. O(1).
    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<(Piece, Color)> {
        self.board[sq.index() as usize]
    }

    /// Returns a bitboard of all occupied squares.
    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.colors[0] | self.colors[1]
    }

    /// Returns a bitboard of all empty squares.
    #[inline]
    pub fn empty_squares(&self) -> Bitboard {
        !self.occupied()
    }

    /// Returns a bitboard of pieces of the given type and color.
    #[inline]
    pub fn pieces_of(&self, piece: Piece, color: Color) -> Bitboard {
        self.pieces[piece.index()] & self.colors[color.index()]
    }

    /// Returns the square of the given color's king.
    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        let bb = self.pieces_of(Piece::King, color);
        unsafe { Square::from_index_unchecked(bb.lsb().expect("every position has a king")) }
    }

    /// Returns true if the side to move is currently in check.
    #[inline]
    pub fn in_check(&self) -> bool {
        self.checkers.is_not_empty()
    }

    /// Returns true if the position has repeated at least `count` times
    /// (including the current occurrence) since the last irreversible move.
    pub fn is_repetition(&self, count: usize) -> bool {
        let current = self.zobrist_key;
        self.key_history.iter().filter(|&&k| k == current).count() >= count
    }

    /// "Strict" repetition check: true if the current key recurs anywhere in
    /// the last `recent_window` half-moves, treated as an immediate
    /// three-fold draw. Search trees revisit positions far less than real
    /// games do, so one repetition within the window the search itself just
    /// walked is already a strong draw signal; used by the search to prune
    /// repeated lines aggressively instead of waiting for a true 3-fold.
    pub fn is_repetition_strict(&self, recent_window: usize) -> bool {
        let current = self.zobrist_key;
        let len = self.key_history.len();
        if len <= 1 {
            return false;
        }
        let start = len - 1 - recent_window.min(len - 1);
        self.key_history[start..len - 1].iter().any(|&k| k == current)
    }

    /// Returns true if the position is drawn by the fifty-move rule.
    #[inline]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100
    }

    /// Validates a move known to be pseudo-legal *in some position* (e.g.
    /// decoded from a transposition-table entry's compact from/to/flag
    /// triple) against the current position: confirms the moved piece is
    /// actually on `from` under the side to move, that the destination
    /// isn't occupied by a piece of the same color, then replays make/unmake
    /// to confirm the king isn't left in check. Returns the fully-populated
    /// `Move` on success. Far cheaper than `generate_legal_moves` plus a
    /// linear scan, since it generates no moves at all — used on the hot
    /// hash-move-validation path.
    pub fn is_legal_soft(&mut self, from: Square, to: Square, flag: MoveFlag) -> Option<Move> {
        let (piece, color) = self.board[from.index() as usize]?;
        if color != self.side_to_move || from == to {
            return None;
        }
        if flag.is_promotion() && piece != Piece::Pawn {
            return None;
        }
        if !flag.is_castling() {
            if let Some((_, dest_color)) = self.board[to.index() as usize] {
                if dest_color == color {
                    return None;
                }
            }
        }
        let captured = if flag == MoveFlag::EnPassant {
            Some(Piece::Pawn)
        } else {
            self.board[to.index() as usize].map(|(p, _)| p)
        };

        let m = Move::new(from, to, flag, piece, captured);
        self.make_move(m);
        let king_safe = self
            .attackers_of(self.king_square(color), color.opposite())
            .is_empty();
        self.unmake_move(m);

        if king_safe {
            Some(m)
        } else {
            None
        }
    }

    /// Returns the bitboard of pieces of `attacker_color` attacking `sq`.
    pub fn attackers_of(&self, sq: Square, attacker_color: Color) -> Bitboard {
        let occ = self.occupied();
        let mut attackers = Bitboard::EMPTY;

        attackers |= knight_attacks(sq) & self.pieces_of(Piece::Knight, attacker_color);
        attackers |= king_attacks(sq) & self.pieces_of(Piece::King, attacker_color);
        attackers |= pawn_attacks(sq, attacker_color.opposite()) & self.pieces_of(Piece::Pawn, attacker_color);

        let bishops_queens = self.pieces_of(Piece::Bishop, attacker_color) | self.pieces_of(Piece::Queen, attacker_color);
        attackers |= bishop_attacks(sq, occ) & bishops_queens;

        let rooks_queens = self.pieces_of(Piece::Rook, attacker_color) | self.pieces_of(Piece::Queen, attacker_color);
        attackers |= rook_attacks(sq, occ) & rooks_queens;

        attackers
    }

    /// Returns true if `sq` is attacked by `attacker_color`, using `occ` as
    /// the occupancy for sliding-piece rays. Used by king-move legality
    /// checks, which must pretend the moving king isn't on the board so a
    /// slider can "see through" the square it's vacating.
    pub fn is_attacked_with_occupancy(&self, sq: Square, attacker_color: Color, occ: Bitboard) -> bool {
        if (knight_attacks(sq) & self.pieces_of(Piece::Knight, attacker_color)).is_not_empty() {
            return true;
        }
        if (king_attacks(sq) & self.pieces_of(Piece::King, attacker_color)).is_not_empty() {
            return true;
        }
        if (pawn_attacks(sq, attacker_color.opposite()) & self.pieces_of(Piece::Pawn, attacker_color)).is_not_empty() {
            return true;
        }
        let bishops_queens = self.pieces_of(Piece::Bishop, attacker_color) | self.pieces_of(Piece::Queen, attacker_color);
        if (bishop_attacks(sq, occ) & bishops_queens).is_not_empty() {
            return true;
        }
        let rooks_queens = self.pieces_of(Piece::Rook, attacker_color) | self.pieces_of(Piece::Queen, attacker_color);
        if (rook_attacks(sq, occ) & rooks_queens).is_not_empty() {
            return true;
        }
        false
    }

    /// Returns true if `sq` is attacked by `attacker_color` in the current
    /// position.
    #[inline]
    pub fn is_square_attacked(&self, sq: Square, attacker_color: Color) -> bool {
        self.is_attacked_with_occupancy(sq, attacker_color, self.occupied())
    }

    fn compute_zobrist_key(&self) -> u64 {
        let mut key = 0u64;
        for sq_idx in 0..64u8 {
            let sq = unsafe { Square::from_index_unchecked(sq_idx) };
            if let Some((piece, color)) = self.board[sq_idx as usize] {
                key ^= ZOBRIST.piece_key(piece, color, sq);
            }
        }
        for bit in self.castling.bits() {
            key ^= ZOBRIST.castling_key(bit);
        }
        if let Some(ep) = self.en_passant {
            if self.ep_capture_is_possible(ep) {
                key ^= ZOBRIST.en_passant_key(ep.file().index() as usize);
            }
        }
        if self.side_to_move == Color::Black {
            key ^= ZOBRIST.black_to_move;
        }
        key
    }

    /// Polyglot convention: the en passant file is only hashed when an enemy
    /// pawn is actually positioned to make the capture, not merely whenever
    /// a double push happened.
    fn ep_capture_is_possible(&self, ep_square: Square) -> bool {
        let capturer = self.side_to_move;
        let capturer_pawns = self.pieces_of(Piece::Pawn, capturer);
        (pawn_attacks(ep_square, capturer.opposite()) & capturer_pawns).is_not_empty()
    }

    #[inline]
    fn set_piece(&mut self, sq: Square, piece: Piece, color: Color) {
        self.pieces[piece.index()].set(sq);
        self.colors[color.index()].set(sq);
        self.board[sq.index() as usize] = Some((piece, color));
        self.zobrist_key ^= ZOBRIST.piece_key(piece, color, sq);
    }

    #[inline]
    fn remove_piece(&mut self, sq: Square, piece: Piece, color: Color) {
        self.pieces[piece.index()].clear(sq);
        self.colors[color.index()].clear(sq);
        self.board[sq.index() as usize] = None;
        self.zobrist_key ^= ZOBRIST.piece_key(piece, color, sq);
    }

    fn set_en_passant(&mut self, sq: Option<Square>) {
        if let Some(old) = self.en_passant {
            if self.ep_capture_is_possible(old) {
                self.zobrist_key ^= ZOBRIST.en_passant_key(old.file().index() as usize);
            }
        }
        self.en_passant = sq;
    }

    /// Applies `m` in place. `m` must be a legal move generated for this
    /// exact position (use [`crate::movegen::generate_legal_moves`]).
    pub fn make_move(&mut self, m: Move) {
        let us = self.side_to_move;
        let them = us.opposite();
        let from = m.from();
        let to = m.to();
        let flag = m.flag();
        let moved = m.moved_piece().expect("legal moves carry piece metadata");

        let record = UndoRecord {
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            checkers: self.checkers,
            zobrist_key: self.zobrist_key,
            captured: m.captured_piece(),
        };

        // Castling rights XOR-out before mutation, XOR back in after.
        let old_castling_bits: Vec<usize> = self.castling.bits().collect();
        for bit in &old_castling_bits {
            self.zobrist_key ^= ZOBRIST.castling_key(*bit);
        }

        self.set_en_passant(None);

        let is_capture = flag == MoveFlag::EnPassant || self.piece_at(to).is_some();

        if flag == MoveFlag::EnPassant {
            let captured_sq = unsafe { Square::from_index_unchecked(from.rank().index() * 8 + to.file().index()) };
            self.remove_piece(captured_sq, Piece::Pawn, them);
        } else if let Some((captured_piece, _)) = self.piece_at(to) {
            self.remove_piece(to, captured_piece, them);
        }

        self.remove_piece(from, moved, us);
        if let Some(promo) = flag.promotion_piece() {
            self.set_piece(to, promo, us);
        } else {
            self.set_piece(to, moved, us);
        }

        if flag.is_castling() {
            let rank = from.rank().index();
            let (rook_from, rook_to) = match flag {
                MoveFlag::CastleKingside => (
                    Square::new(chess_core::File::H, from.rank()),
                    Square::new(chess_core::File::F, from.rank()),
                ),
                MoveFlag::CastleQueenside => (
                    Square::new(chess_core::File::A, from.rank()),
                    Square::new(chess_core::File::D, from.rank()),
                ),
                _ => unreachable!(),
            };
            let _ = rank;
            self.remove_piece(rook_from, Piece::Rook, us);
            self.set_piece(rook_to, Piece::Rook, us);
        }

        if flag == MoveFlag::DoublePush {
            let ep_sq = unsafe { Square::from_index_unchecked((from.index() + to.index()) / 2) };
            self.set_en_passant(Some(ep_sq));
            if self.ep_capture_is_possible(ep_sq) {
                self.zobrist_key ^= ZOBRIST.en_passant_key(ep_sq.file().index() as usize);
            }
        }

        // Update castling rights: moving the king, a rook, or capturing a
        // rook on its home square revokes the corresponding rights.
        match moved {
            Piece::King => self.castling.remove_color(us),
            Piece::Rook => revoke_rook_right(&mut self.castling, from, us),
            _ => {}
        }
        if let Some(captured_piece) = record.captured {
            if captured_piece == Piece::Rook {
                revoke_rook_right(&mut self.castling, to, them);
            }
        }
        for bit in self.castling.bits() {
            self.zobrist_key ^= ZOBRIST.castling_key(bit);
        }

        if moved == Piece::Pawn || is_capture {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }

        if us == Color::Black {
            self.fullmove_number += 1;
        }

        self.side_to_move = them;
        self.zobrist_key ^= ZOBRIST.black_to_move;

        self.checkers = self.attackers_of(self.king_square(them), us);

        if moved == Piece::Pawn || is_capture || flag.is_castling() {
            self.key_history.clear();
        }
        self.key_history.push(self.zobrist_key);
        self.undo_stack.push(record);
    }

    /// Reverses the most recent [`Position::make_move`] call.
    pub fn unmake_move(&mut self, m: Move) {
        let record = self.undo_stack.pop().expect("unmake without make");
        self.key_history.pop();

        let them = self.side_to_move; // side that just moved becomes "them" from new perspective
        let us = them.opposite();
        self.side_to_move = us;

        let from = m.from();
        let to = m.to();
        let flag = m.flag();
        let moved = m.moved_piece().expect("legal moves carry piece metadata");

        if flag.is_castling() {
            let (rook_from, rook_to) = match flag {
                MoveFlag::CastleKingside => (
                    Square::new(chess_core::File::H, from.rank()),
                    Square::new(chess_core::File::F, from.rank()),
                ),
                MoveFlag::CastleQueenside => (
                    Square::new(chess_core::File::A, from.rank()),
                    Square::new(chess_core::File::D, from.rank()),
                ),
                _ => unreachable!(),
            };
            self.pieces[Piece::Rook.index()].clear(rook_to);
            self.colors[us.index()].clear(rook_to);
            self.board[rook_to.index() as usize] = None;
            self.pieces[Piece::Rook.index()].set(rook_from);
            self.colors[us.index()].set(rook_from);
            self.board[rook_from.index() as usize] = Some((Piece::Rook, us));
        }

        // Remove whatever sits on `to` (the moved/promoted piece).
        self.pieces[moved.index()].clear(to);
        if let Some(promo) = flag.promotion_piece() {
            self.pieces[promo.index()].clear(to);
        }
        self.colors[us.index()].clear(to);
        self.board[to.index() as usize] = None;

        // Restore the moved piece on `from`.
        self.pieces[moved.index()].set(from);
        self.colors[us.index()].set(from);
        self.board[from.index() as usize] = Some((moved, us));

        if flag == MoveFlag::EnPassant {
            let captured_sq = unsafe { Square::from_index_unchecked(from.rank().index() * 8 + to.file().index()) };
            self.pieces[Piece::Pawn.index()].set(captured_sq);
            self.colors[them.index()].set(captured_sq);
            self.board[captured_sq.index() as usize] = Some((Piece::Pawn, them));
        } else if let Some(captured) = record.captured {
            self.pieces[captured.index()].set(to);
            self.colors[them.index()].set(to);
            self.board[to.index() as usize] = Some((captured, them));
        }

        if us == Color::Black {
            self.fullmove_number -= 1;
        }

        self.castling = record.castling;
        self.en_passant = record.en_passant;
        self.halfmove_clock = record.halfmove_clock;
        self.checkers = record.checkers;
        self.zobrist_key = record.zobrist_key;
    }

    /// Applies a null move: flips the side to move without moving a piece,
    /// used by null-move pruning. Always legal when not in check.
    pub fn make_null_move(&mut self) {
        let record = UndoRecord {
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            checkers: self.checkers,
            zobrist_key: self.zobrist_key,
            captured: None,
        };
        self.set_en_passant(None);
        self.side_to_move = self.side_to_move.opposite();
        self.zobrist_key ^= ZOBRIST.black_to_move;
        self.checkers = self.attackers_of(
            self.king_square(self.side_to_move),
            self.side_to_move.opposite(),
        );
        self.key_history.push(self.zobrist_key);
        self.undo_stack.push(record);
    }

    /// Reverses [`Position::make_null_move`].
    pub fn unmake_null_move(&mut self) {
        let record = self.undo_stack.pop().expect("unmake_null without make_null");
        self.key_history.pop();
        self.side_to_move = self.side_to_move.opposite();
        self.castling = record.castling;
        self.en_passant = record.en_passant;
        self.halfmove_clock = record.halfmove_clock;
        self.checkers = record.checkers;
        self.zobrist_key = record.zobrist_key;
    }

    /// Returns the game's outcome, if it has ended, given the set of legal
    /// moves available to the side to move (callers already compute this
    /// for search/UI purposes, so it's passed in rather than recomputed).
    pub fn game_result(&self, legal_moves_exist: bool) -> Option<GameResult> {
        if !legal_moves_exist {
            return Some(if self.in_check() {
                GameResult::Decisive(self.side_to_move.opposite())
            } else {
                GameResult::Draw(DrawReason::Stalemate)
            });
        }
        if self.is_fifty_move_draw() {
            return Some(GameResult::Draw(DrawReason::FiftyMoveRule));
        }
        if self.is_repetition(3) {
            return Some(GameResult::Draw(DrawReason::ThreefoldRepetition));
        }
        if self.is_insufficient_material() {
            return Some(GameResult::Draw(DrawReason::InsufficientMaterial));
        }
        None
    }

    /// Returns true if neither side has enough material to deliver
    /// checkmate: K-vs-K, K+N-vs-K, K+B-vs-K, or K+B-vs-K+B with
    /// same-colored bishops.
    pub fn is_insufficient_material(&self) -> bool {
        if self.pieces[Piece::Pawn.index()].is_not_empty()
            || self.pieces[Piece::Rook.index()].is_not_empty()
            || self.pieces[Piece::Queen.index()].is_not_empty()
        {
            return false;
        }

        let white_minors =
            self.pieces_of(Piece::Knight, Color::White) | self.pieces_of(Piece::Bishop, Color::White);
        let black_minors =
            self.pieces_of(Piece::Knight, Color::Black) | self.pieces_of(Piece::Bishop, Color::Black);

        match (white_minors.count(), black_minors.count()) {
            (0, 0) => true,
            (1, 0) | (0, 1) => true,
            (1, 1) => {
                let white_bishops = self.pieces_of(Piece::Bishop, Color::White);
                let black_bishops = self.pieces_of(Piece::Bishop, Color::Black);
                if white_bishops.is_not_empty() && black_bishops.is_not_empty() {
                    let white_on_light = (white_bishops & Bitboard::LIGHT_SQUARES).is_not_empty();
                    let black_on_light = (black_bishops & Bitboard::LIGHT_SQUARES).is_not_empty();
                    white_on_light == black_on_light
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}

/// The outcome of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    /// One side checkmated the other.
    Decisive(Color),
    /// The game ended without a winner.
    Draw(DrawReason),
}

/// Why a game was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    Stalemate,
    FiftyMoveRule,
    ThreefoldRepetition,
    InsufficientMaterial,
}

fn revoke_rook_right(castling: &mut CastlingRights, sq: Square, color: Color) {
    let back_rank = match color {
        Color::White => chess_core::Rank::R1,
        Color::Black => chess_core::Rank::R8,
    };
    if sq.rank() != back_rank {
        return;
    }
    match sq.file() {
        chess_core::File::A => {
            if matches!(color, Color::White) {
                castling.0 &= !CastlingRights::WHITE_QUEENSIDE;
            } else {
                castling.0 &= !CastlingRights::BLACK_QUEENSIDE;
            }
        }
        chess_core::File::H => {
            if matches!(color, Color::White) {
                castling.0 &= !CastlingRights::WHITE_KINGSIDE;
            } else {
                castling.0 &= !CastlingRights::BLACK_KINGSIDE;
            }
        }
        _ => {}
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::generate_legal_moves;

    #[test]
    fn startpos_fen_roundtrip() {
        let pos = Position::startpos();
        assert_eq!(pos.to_fen(), FenParser::STARTPOS);
    }

    #[test]
    fn custom_fen_roundtrip() {
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn piece_at() {
        let pos = Position::startpos();
        assert_eq!(pos.piece_at(Square::E1), Some((Piece::King, Color::White)));
        assert_eq!(pos.piece_at(Square::E8), Some((Piece::King, Color::Black)));
        assert_eq!(
            pos.piece_at(Square::new(chess_core::File::E, chess_core::Rank::R4)),
            None
        );
    }

    #[test]
    fn castling_rights() {
        let mut rights = CastlingRights::ALL;
        assert!(rights.can_castle_kingside(Color::White));
        assert!(rights.can_castle_queenside(Color::Black));

        rights.remove_kingside(Color::White);
        assert!(!rights.can_castle_kingside(Color::White));
        assert!(rights.can_castle_queenside(Color::White));
    }

    #[test]
    fn position_empty() {
        let pos = Position::empty();
        assert_eq!(pos.side_to_move, Color::White);
        assert_eq!(pos.castling.raw(), 0);
        assert_eq!(pos.en_passant, None);
        assert_eq!(pos.halfmove_clock, 0);
        assert_eq!(pos.fullmove_number, 1);
        assert!(pos.occupied().is_empty());
    }

    #[test]
    fn position_default() {
        let pos = Position::default();
        assert_eq!(pos.to_fen(), FenParser::STARTPOS);
    }

    #[test]
    fn position_pieces_of() {
        let pos = Position::startpos();
        assert_eq!(pos.pieces_of(Piece::Pawn, Color::White).count(), 8);
        assert_eq!(pos.pieces_of(Piece::Pawn, Color::Black).count(), 8);
        assert_eq!(pos.pieces_of(Piece::King, Color::White).count(), 1);
        assert_eq!(pos.pieces_of(Piece::King, Color::Black).count(), 1);
    }

    #[test]
    fn position_with_en_passant() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let pos = Position::from_fen(fen).unwrap();
        assert!(pos.en_passant.is_some());
        assert_eq!(pos.en_passant.unwrap().to_algebraic(), "e3");
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn make_unmake_restores_exact_fen() {
        let mut pos = Position::startpos();
        let fen_before = pos.to_fen();
        let m = generate_legal_moves(&pos)
            .as_slice()
            .iter()
            .find(|m| m.to_uci() == "e2e4")
            .copied()
            .unwrap();
        pos.make_move(m);
        assert_ne!(pos.to_fen(), fen_before);
        pos.unmake_move(m);
        assert_eq!(pos.to_fen(), fen_before);
    }

    #[test]
    fn make_unmake_castling_restores_rook() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        let mut pos = Position::from_fen(fen).unwrap();
        let m = generate_legal_moves(&pos)
            .as_slice()
            .iter()
            .find(|m| m.flag() == MoveFlag::CastleKingside)
            .copied()
            .unwrap();
        pos.make_move(m);
        assert!(pos.piece_at(Square::F1).is_some());
        assert!(pos.piece_at(Square::H1).is_none());
        pos.unmake_move(m);
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn make_unmake_en_passant_restores_captured_pawn() {
        let fen = "rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 1";
        let mut pos = Position::from_fen(fen).unwrap();
        let m = generate_legal_moves(&pos)
            .as_slice()
            .iter()
            .find(|m| m.flag() == MoveFlag::EnPassant)
            .copied()
            .unwrap();
        pos.make_move(m);
        assert!(pos.piece_at(Square::D5).is_none());
        pos.unmake_move(m);
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn zobrist_key_round_trips_through_make_unmake() {
        let mut pos = Position::startpos();
        let key_before = pos.zobrist_key;
        let m = generate_legal_moves(&pos)
            .as_slice()
            .iter()
            .find(|m| m.to_uci() == "g1f3")
            .copied()
            .unwrap();
        pos.make_move(m);
        assert_ne!(pos.zobrist_key, key_before);
        pos.unmake_move(m);
        assert_eq!(pos.zobrist_key, key_before);
    }

    #[test]
    fn null_move_round_trips() {
        let mut pos = Position::startpos();
        let key_before = pos.zobrist_key;
        pos.make_null_move();
        assert_eq!(pos.side_to_move, Color::Black);
        pos.unmake_null_move();
        assert_eq!(pos.side_to_move, Color::White);
        assert_eq!(pos.zobrist_key, key_before);
    }

    #[test]
    fn en_passant_only_hashed_when_capturable() {
        // En-passant square exists but no pawn can actually capture it.
        let capturable = Position::from_fen(
            "rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 1",
        )
        .unwrap();
        let mut no_capturer = capturable.clone();
        no_capturer.pieces[Piece::Pawn.index()].clear(Square::E5);
        no_capturer.colors[Color::White.index()].clear(Square::E5);
        let recomputed = no_capturer.compute_zobrist_key();
        assert_eq!(no_capturer.zobrist_key, recomputed);
    }

    fn make_uci(pos: &mut Position, uci: &str) -> Move {
        let m = generate_legal_moves(pos)
            .as_slice()
            .iter()
            .find(|m| m.to_uci() == uci)
            .copied()
            .unwrap();
        pos.make_move(m);
        m
    }

    #[test]
    fn is_repetition_strict_flags_single_recurrence_within_window() {
        let mut pos = Position::startpos();
        make_uci(&mut pos, "g1f3");
        make_uci(&mut pos, "g8f6");
        make_uci(&mut pos, "f3g1");
        assert!(!pos.is_repetition_strict(3));
        make_uci(&mut pos, "f6g8");
        // Back to the startpos key after a 4-ply knight shuffle; only one
        // true recurrence, which plain `is_repetition(3)` would miss.
        assert!(!pos.is_repetition(3));
        assert!(pos.is_repetition_strict(4));
    }

    #[test]
    fn is_repetition_strict_ignores_recurrence_outside_window() {
        let mut pos = Position::startpos();
        make_uci(&mut pos, "g1f3");
        make_uci(&mut pos, "g8f6");
        make_uci(&mut pos, "f3g1");
        make_uci(&mut pos, "f6g8");
        assert!(!pos.is_repetition_strict(1));
    }

    #[test]
    fn is_legal_soft_accepts_pseudo_legal_move() {
        let mut pos = Position::startpos();
        let from = Square::new(chess_core::File::E, chess_core::Rank::R2);
        let to = Square::new(chess_core::File::E, chess_core::Rank::R4);
        let resolved = pos.is_legal_soft(from, to, MoveFlag::DoublePush).unwrap();
        assert_eq!(resolved.from(), from);
        assert_eq!(resolved.to(), to);
        assert_eq!(resolved.moved_piece(), Some(Piece::Pawn));
        // Unmake left the board untouched.
        assert_eq!(pos.to_fen(), FenParser::STARTPOS);
    }

    #[test]
    fn is_legal_soft_rejects_move_leaving_own_king_in_check() {
        let fen = "4k3/8/8/8/8/8/4r3/4K3 w - - 0 1";
        let mut pos = Position::from_fen(fen).unwrap();
        // d2 is still on the rook's rank, so the king would stay in check.
        let from = Square::E1;
        let to = Square::new(chess_core::File::D, chess_core::Rank::R2);
        assert!(pos.is_legal_soft(from, to, MoveFlag::Normal).is_none());
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn is_legal_soft_rejects_empty_origin_square() {
        let mut pos = Position::startpos();
        let from = Square::new(chess_core::File::E, chess_core::Rank::R4);
        let to = Square::new(chess_core::File::E, chess_core::Rank::R5);
        assert!(pos.is_legal_soft(from, to, MoveFlag::Normal).is_none());
    }
}
