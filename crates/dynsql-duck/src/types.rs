//! DuckDB type names to datatype codes and text lengths
//!
//! Codes follow the `duckdb_type` enumeration of the DuckDB C API.

use duckdb::arrow::datatypes::{DataType, TimeUnit};

pub const INVALID: u16 = 0;
pub const BOOLEAN: u16 = 1;
pub const TINYINT: u16 = 2;
pub const SMALLINT: u16 = 3;
pub const INTEGER: u16 = 4;
pub const BIGINT: u16 = 5;
pub const UTINYINT: u16 = 6;
pub const USMALLINT: u16 = 7;
pub const UINTEGER: u16 = 8;
pub const UBIGINT: u16 = 9;
pub const FLOAT: u16 = 10;
pub const DOUBLE: u16 = 11;
pub const TIMESTAMP: u16 = 12;
pub const DATE: u16 = 13;
pub const TIME: u16 = 14;
pub const INTERVAL: u16 = 15;
pub const HUGEINT: u16 = 16;
pub const VARCHAR: u16 = 17;
pub const BLOB: u16 = 18;
pub const DECIMAL: u16 = 19;
pub const TIMESTAMP_S: u16 = 20;
pub const TIMESTAMP_MS: u16 = 21;
pub const TIMESTAMP_NS: u16 = 22;
pub const ENUM: u16 = 23;
pub const LIST: u16 = 24;
pub const STRUCT: u16 = 25;
pub const MAP: u16 = 26;
pub const UUID: u16 = 27;
pub const UNION: u16 = 28;
pub const BIT: u16 = 29;
pub const TIME_TZ: u16 = 30;
pub const TIMESTAMP_TZ: u16 = 31;
pub const UHUGEINT: u16 = 32;
pub const ARRAY: u16 = 33;

/// Code, text length and numeric attributes derived from a type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub code: u16,
    /// `None` for types whose text form has no fixed bound
    pub max_length: Option<usize>,
    pub precision: u8,
    pub scale: i8,
}

impl TypeInfo {
    fn fixed(code: u16, max_length: usize, precision: u8) -> Self {
        Self {
            code,
            max_length: Some(max_length),
            precision,
            scale: 0,
        }
    }

    fn unbounded(code: u16) -> Self {
        Self {
            code,
            max_length: None,
            precision: 0,
            scale: 0,
        }
    }
}

/// Classify a type name as DuckDB's `DESCRIBE` reports it
pub fn type_info(type_name: &str) -> TypeInfo {
    let name = type_name.trim().to_ascii_uppercase();

    if name.ends_with("[]") {
        return TypeInfo::unbounded(LIST);
    }
    if name.ends_with(']') {
        return TypeInfo::unbounded(ARRAY);
    }

    let base = name.split('(').next().unwrap_or_default().trim();
    match base {
        "BOOLEAN" | "BOOL" => TypeInfo::fixed(BOOLEAN, 5, 1),
        "TINYINT" | "INT1" => TypeInfo::fixed(TINYINT, 4, 3),
        "SMALLINT" | "INT2" => TypeInfo::fixed(SMALLINT, 6, 5),
        "INTEGER" | "INT" | "INT4" => TypeInfo::fixed(INTEGER, 11, 10),
        "BIGINT" | "INT8" => TypeInfo::fixed(BIGINT, 20, 19),
        "HUGEINT" | "INT128" => TypeInfo::fixed(HUGEINT, 40, 38),
        "UTINYINT" => TypeInfo::fixed(UTINYINT, 3, 3),
        "USMALLINT" => TypeInfo::fixed(USMALLINT, 5, 5),
        "UINTEGER" => TypeInfo::fixed(UINTEGER, 10, 10),
        "UBIGINT" => TypeInfo::fixed(UBIGINT, 20, 20),
        "UHUGEINT" => TypeInfo::fixed(UHUGEINT, 39, 39),
        "FLOAT" | "REAL" | "FLOAT4" => TypeInfo::fixed(FLOAT, 16, 0),
        "DOUBLE" | "FLOAT8" => TypeInfo::fixed(DOUBLE, 25, 0),
        "DECIMAL" | "NUMERIC" => decimal(&name),
        // room for the largest years and the " (BC)" suffix
        "DATE" => TypeInfo::fixed(DATE, 20, 0),
        "TIME" => TypeInfo::fixed(TIME, 15, 0),
        "TIME WITH TIME ZONE" | "TIMETZ" => TypeInfo::fixed(TIME_TZ, 24, 0),
        "TIMESTAMP" | "DATETIME" => TypeInfo::fixed(TIMESTAMP, 34, 0),
        "TIMESTAMP_S" => TypeInfo::fixed(TIMESTAMP_S, 34, 0),
        "TIMESTAMP_MS" => TypeInfo::fixed(TIMESTAMP_MS, 34, 0),
        "TIMESTAMP_NS" => TypeInfo::fixed(TIMESTAMP_NS, 29, 0),
        "TIMESTAMP WITH TIME ZONE" | "TIMESTAMPTZ" => TypeInfo::fixed(TIMESTAMP_TZ, 40, 0),
        "INTERVAL" => TypeInfo::fixed(INTERVAL, 64, 0),
        "UUID" => TypeInfo::fixed(UUID, 36, 0),
        "VARCHAR" | "TEXT" | "STRING" | "JSON" => TypeInfo::unbounded(VARCHAR),
        "BLOB" | "BYTEA" => TypeInfo::unbounded(BLOB),
        "BIT" | "BITSTRING" => TypeInfo::unbounded(BIT),
        "ENUM" => TypeInfo::unbounded(ENUM),
        "STRUCT" => TypeInfo::unbounded(STRUCT),
        "MAP" => TypeInfo::unbounded(MAP),
        "LIST" => TypeInfo::unbounded(LIST),
        "ARRAY" => TypeInfo::unbounded(ARRAY),
        "UNION" => TypeInfo::unbounded(UNION),
        _ => TypeInfo::unbounded(INVALID),
    }
}

/// `DECIMAL(p,s)`; a bare `DECIMAL` is DuckDB's default `DECIMAL(18,3)`
fn decimal(name: &str) -> TypeInfo {
    let args = name
        .split_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .map(|args| {
            args.split(',')
                .map(|a| a.trim().parse::<u8>().ok())
                .collect::<Vec<_>>()
        });

    let (precision, scale) = match args.as_deref() {
        Some([Some(p), Some(s)]) => (*p, *s),
        Some([Some(p)]) => (*p, 0),
        _ => (18, 3),
    };

    // sign, decimal point, and the leading zero of a pure fraction
    let point = usize::from(scale > 0);
    let leading_zero = usize::from(scale >= precision);
    TypeInfo {
        code: DECIMAL,
        max_length: Some(precision as usize + 1 + point + leading_zero),
        precision,
        scale: scale as i8,
    }
}

/// DuckDB type name for an Arrow result column, as `DESCRIBE` would print it
pub fn arrow_type_name(data_type: &DataType) -> String {
    let name = match data_type {
        DataType::Boolean => "BOOLEAN",
        DataType::Int8 => "TINYINT",
        DataType::Int16 => "SMALLINT",
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::UInt8 => "UTINYINT",
        DataType::UInt16 => "USMALLINT",
        DataType::UInt32 => "UINTEGER",
        DataType::UInt64 => "UBIGINT",
        DataType::Float16 | DataType::Float32 => "FLOAT",
        DataType::Float64 => "DOUBLE",
        DataType::Decimal128(precision, scale) | DataType::Decimal256(precision, scale) => {
            return format!("DECIMAL({},{})", precision, scale)
        }
        DataType::Date32 | DataType::Date64 => "DATE",
        DataType::Time32(_) | DataType::Time64(_) => "TIME",
        DataType::Timestamp(_, Some(_)) => "TIMESTAMP WITH TIME ZONE",
        DataType::Timestamp(TimeUnit::Second, None) => "TIMESTAMP_S",
        DataType::Timestamp(TimeUnit::Millisecond, None) => "TIMESTAMP_MS",
        DataType::Timestamp(TimeUnit::Nanosecond, None) => "TIMESTAMP_NS",
        DataType::Timestamp(_, None) => "TIMESTAMP",
        DataType::Interval(_) | DataType::Duration(_) => "INTERVAL",
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => "VARCHAR",
        DataType::Binary | DataType::LargeBinary | DataType::FixedSizeBinary(_) => "BLOB",
        DataType::List(_) | DataType::LargeList(_) => "LIST",
        DataType::FixedSizeList(..) => "ARRAY",
        DataType::Struct(_) => "STRUCT",
        DataType::Map(..) => "MAP",
        DataType::Union(..) => "UNION",
        DataType::Dictionary(..) => "ENUM",
        _ => "UNKNOWN",
    };
    name.to_string()
}
