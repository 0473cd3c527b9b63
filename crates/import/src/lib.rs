pub mod delimited;
pub mod mapping;
pub mod pairing;
pub mod preview;
pub mod rules;
pub mod selection;
pub mod session;
pub mod transfer;

pub use delimited::{parse_text, Delimiter, ParseError, ParseOptions, ParsedRow, ParsedTable};
pub use mapping::{Field, FieldMap, MappedRow};
pub use pairing::detect_transfers;
pub use preview::{
    CategorySuggestions, EvaluateData, EvaluateRequest, EvaluateResponse, PreviewTransaction,
    RowVerdict,
};
pub use rules::{LocalEvaluator, RuleFileError};
pub use selection::Selection;
pub use session::{
    ConfirmTicket, DraftRow, Generation, ImportSession, PreviewSummary, PreviewTicket, Stage,
    WorkflowError,
};
pub use transfer::{
    ConfirmTransfersRequest, ConfirmTransfersResponse, TransferCandidate, TransferEdit,
    TransferPair, TransferPosting, TRANSFER_MEMO,
};
