//! UCI front end wired to the `chess-engine` search, evaluator, and caches.
//!
//! This binary owns nothing but protocol plumbing and time management: one
//! persistent [`Position`] updated by `position`/`go`, one persistent
//! [`SearchState`] reused across searches so the transposition table stays
//! warm move to move, and a [`SearchObserver`] that turns each completed
//! iterative-deepening depth into a UCI `info` line.

use std::io::{BufReader, Stdin, Stdout};
use std::time::Duration;

use chess_core::Move;
use chess_engine::{search, Params, Position, SearchInfo, SearchLimits, SearchObserver, SearchState, StopToken};
use uci::{stdio_engine, GuiCommand, InfoBuilder, UciEngine};

type StdioEngine = UciEngine<BufReader<Stdin>, Stdout>;

struct UciObserver<'a> {
    engine: &'a mut StdioEngine,
}

impl SearchObserver for UciObserver<'_> {
    fn on_info(&mut self, info: &SearchInfo) {
        let mut builder = InfoBuilder::new()
            .depth(info.depth as u32)
            .nodes(info.nodes)
            .time(info.elapsed.as_millis() as u64)
            .pv(info.pv.iter().copied().map(Move::to_uci).collect());

        builder = match info.mate {
            Some(moves) => builder.score_mate(moves),
            None => builder.score_cp(info.score_cp),
        };

        let nps = if info.elapsed.as_millis() > 0 {
            info.nodes * 1000 / info.elapsed.as_millis() as u64
        } else {
            0
        };
        builder = builder.nps(nps);

        self.engine.send_info(builder.build()).ok();
    }
}

/// Resolves a bare UCI move (from `Move::from_uci`, which carries no piece
/// metadata) against the position's legal moves to get a fully-populated
/// [`Move`] suitable for `make_move`.
fn resolve_uci_move(position: &Position, uci_move: Move) -> Option<Move> {
    let legal = chess_engine::generate_legal_moves(position);
    legal.as_slice().iter().copied().find(|m| {
        m.from() == uci_move.from() && m.to() == uci_move.to() && m.flag() == uci_move.flag()
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let params = Params::default();
    let mut state = SearchState::new(&params);
    let stop = StopToken::new();

    let mut engine = stdio_engine();
    let mut position = Position::startpos();

    loop {
        let cmd = match engine.read_command() {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse UCI command");
                continue;
            }
        };

        match cmd {
            GuiCommand::Uci => {
                engine.send_id("chess-engine-bot", "Chess Devtools").unwrap();
                engine.send_uciok().unwrap();
            }

            GuiCommand::Extensions => {
                engine.send_extensionsok().unwrap();
            }

            GuiCommand::IsReady => {
                engine.send_readyok().unwrap();
            }

            GuiCommand::Position { fen, moves } => {
                position = match fen {
                    Some(f) => Position::from_fen(&f).unwrap_or_else(|_| Position::startpos()),
                    None => Position::startpos(),
                };

                for mv_str in moves {
                    if let Some(bare) = Move::from_uci(&mv_str) {
                        if let Some(legal_mv) = resolve_uci_move(&position, bare) {
                            position.make_move(legal_mv);
                        }
                    }
                }
            }

            GuiCommand::Go(opts) => {
                let limits = SearchLimits {
                    movetime: opts.movetime.map(Duration::from_millis),
                    depth: opts.depth.map(|d| d.min(u8::MAX as u32) as u8),
                    nodes: opts.nodes,
                    white_time: opts.wtime.map(Duration::from_millis),
                    black_time: opts.btime.map(Duration::from_millis),
                    white_increment: opts.winc.map(Duration::from_millis),
                    black_increment: opts.binc.map(Duration::from_millis),
                    moves_to_go: opts.movestogo,
                    infinite: opts.infinite || opts.ponder,
                };

                let mut observer = UciObserver { engine: &mut engine };
                let best = search(&position, limits, &params, &mut state, &stop, &mut observer);

                match best {
                    Some(mv) => engine.send_bestmove(&mv.to_uci()).unwrap(),
                    None => engine.send_bestmove("0000").unwrap(),
                }
            }

            GuiCommand::Stop => {
                stop.stop();
            }

            GuiCommand::Quit => {
                break;
            }

            GuiCommand::Unknown(_) => {}
        }
    }
}
