//! KiCad schematic document model and S-expression parser.
//!
//! The parser is a single cooperative state machine over a token stream: at
//! every `(` the next symbol selects a production, productions read their
//! subforms in any order, and each production validates its own closing `)`.
//! A decade of format drift is absorbed on read — files are normalized to
//! the current model and the version-specific fixups are applied exactly
//! once, at parse time.
//!
//! Entry points live on [`SchParser`]: [`SchParser::parse_library`],
//! [`SchParser::parse_symbol`], [`SchParser::parse_schematic`] and
//! [`SchParser::parse_symbol_draw_item`].

mod bitmap;
mod document;
mod embedded;
mod error;
mod field;
mod item;
mod parser;
mod pin;
mod shape;
mod stroke;
mod symbol;
mod text;

pub use bitmap::Bitmap;
pub use document::{Document, PageInfo, SheetInstanceData, SymbolInstanceData, TitleBlock};
pub use embedded::{EmbeddedFile, EmbeddedFileKind, EmbeddedFiles};
pub use error::SchError;
pub use field::{Field, FieldId};
pub use item::{
    BusAlias, BusEntry, Group, InstancePin, Junction, Label, LabelKind, LabelShape, Line,
    LineLayer, Mirror, NoConnect, RuleArea, SchItem, SchItemKind, SchText, Sheet, SheetPin,
    SheetSide, SymbolInstance, SymbolLink, Table, TableCell, TextBox,
};
pub use parser::{ParseOptions, SchParser, SCHEMATIC_FILE_VERSION, SYMBOL_LIB_FILE_VERSION};
pub use pin::{Pin, PinAlt, PinGraphicStyle, PinOrientation, PinType};
pub use shape::{Shape, ShapeKind};
pub use stroke::{Color, FillParams, FillType, LineStyle, StrokeParams};
pub use symbol::{DrawItem, LibSymbol, LibSymbolMap, LibText, PowerType};
pub use text::{convert_to_new_overbar_notation, HJustify, TextEffects, VJustify};
