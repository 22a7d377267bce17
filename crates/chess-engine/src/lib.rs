//! High-performance chess engine with bitboard representation.
//!
//! This crate provides:
//! - [`Bitboard`] - 64-bit board representation with efficient operations
//! - [`Position`] - Full game state including piece positions, castling rights, etc.
//! - Legal move generation, static exchange evaluation, and perft validation
//! - SAN notation parsing and generation
//!
//! # Architecture
//!
//! The engine uses bitboards for piece representation - each piece type/color
//! combination has a 64-bit integer where each bit represents a square.
//! This enables efficient move generation using bitwise operations. `Position`
//! mutates in place via [`Position::make_move`]/[`Position::unmake_move`],
//! keeping a mailbox board and an incrementally updated Zobrist key in sync
//! with the bitboards.
//!
//! # Example
//!
//! ```
//! use chess_engine::{movegen, Position};
//!
//! let position = Position::startpos();
//! let moves = movegen::generate_legal_moves(&position);
//! println!("Legal moves from starting position: {}", moves.len());
//! ```

mod bitboard;
pub mod cache;
pub mod eval;
pub mod movegen;
pub mod order;
pub mod params;
mod position;
pub mod san;
pub mod search;
mod zobrist;

pub use bitboard::Bitboard;
pub use eval::evaluate;
pub use movegen::{
    bishop_attacks, generate_legal_moves, generate_quiet, generate_tactical, king_attacks,
    knight_attacks, pawn_attacks, pinned_pieces, queen_attacks, rook_attacks, MoveList,
};
pub use params::Params;
pub use position::{CastlingRights, DrawReason, GameResult, Position};
pub use san::{move_to_san, san_to_move, SanError};
pub use search::{search, SearchInfo, SearchLimits, SearchObserver, SearchState, StopToken};
