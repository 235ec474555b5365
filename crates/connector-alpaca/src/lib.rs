mod parser;
mod poller;
mod stream;

pub use parser::{auth_message, parse_message, subscribe_message, AlpacaTradeRaw, ParsedEvent};
pub use poller::{
    BarPoller, LatestBars, LatestOrderBooks, OrderBookPoller, SnapshotPoller, SnapshotSource,
    SymbolCatalog,
};
pub use stream::{StreamState, TradeStreamClient};
