// Copyright 2024-2026 the mcal developers
// Licensed under the MIT License.

/*!
An in-memory, column-major record batch.

A [`Table`] is an ordered collection of equal-length named columns. Input
tiles arrive with a mix of scalar, vector-valued, and matrix-valued columns;
the collated output uses scalar columns only. Both are ephemeral: a table is
rebuilt for every file and dropped once its rows have been appended to the
output.

*/

use ndarray::{s, Array2, Array3};

use crate::errors::CollateError;
use crate::schema::{ColType, Elem};

/// A single named column of per-row values.
#[derive(Clone, Debug)]
pub enum Column {
    /// Scalar 32-bit integers.
    I32(Vec<i32>),

    /// Scalar 64-bit integers.
    I64(Vec<i64>),

    /// Scalar 64-bit floats.
    F64(Vec<f64>),

    /// Scalar text values.
    Str(Vec<String>),

    /// A fixed-width integer vector per row.
    VecI32(Array2<i32>),

    /// A fixed-width float vector per row.
    VecF64(Array2<f64>),

    /// A fixed-shape float matrix per row.
    MatF64(Array3<f64>),
}

impl Column {
    /// The number of rows in this column.
    pub fn len(&self) -> usize {
        match self {
            Column::I32(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::F64(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::VecI32(a) => a.nrows(),
            Column::VecF64(a) => a.nrows(),
            Column::MatF64(a) => a.shape()[0],
        }
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A short human-readable description of the column's kind, for error
    /// messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Column::I32(_) => "scalar int32",
            Column::I64(_) => "scalar int64",
            Column::F64(_) => "scalar float64",
            Column::Str(_) => "scalar text",
            Column::VecI32(_) => "int32 vector",
            Column::VecF64(_) => "float64 vector",
            Column::MatF64(_) => "float64 matrix",
        }
    }
}

/// Values extracted from a column, before being cast into their declared
/// output storage type.
#[derive(Clone, Debug)]
pub enum Values {
    /// Integer-valued extraction.
    Int(Vec<i64>),

    /// Float-valued extraction.
    Float(Vec<f64>),
}

impl Values {
    /// The number of extracted rows.
    pub fn len(&self) -> usize {
        match self {
            Values::Int(v) => v.len(),
            Values::Float(v) => v.len(),
        }
    }

    /// Whether no rows were extracted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An ordered collection of equal-length named columns.
#[derive(Clone, Debug, Default)]
pub struct Table {
    cols: Vec<(String, Column)>,
}

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Table::default()
    }

    /// Allocate a zero-valued table of scalar columns for `nrows` rows.
    pub fn with_schema(schema: &[(String, ColType)], nrows: usize) -> Self {
        let cols = schema
            .iter()
            .map(|(name, dtype)| {
                let col = match dtype {
                    ColType::I32 => Column::I32(vec![0; nrows]),
                    ColType::I64 => Column::I64(vec![0; nrows]),
                    ColType::F64 => Column::F64(vec![0.0; nrows]),
                    ColType::Str => Column::Str(vec![String::new(); nrows]),
                };
                (name.clone(), col)
            })
            .collect();

        Table { cols }
    }

    /// The number of rows. All columns have the same length.
    pub fn nrows(&self) -> usize {
        self.cols.first().map_or(0, |(_, col)| col.len())
    }

    /// The number of columns.
    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    /// Whether the table holds any columns at all.
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Append a column. The caller is responsible for length consistency.
    pub fn push_column<S: Into<String>>(&mut self, name: S, col: Column) {
        self.cols.push((name.into(), col));
    }

    /// Whether a column of this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.cols.iter().any(|(n, _)| n == name)
    }

    /// Iterate over `(name, column)` pairs in order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.cols.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Iterate mutably over `(name, column)` pairs in order.
    pub fn columns_mut(&mut self) -> impl Iterator<Item = (&str, &mut Column)> {
        self.cols.iter_mut().map(|(n, c)| (n.as_str(), c))
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column, CollateError> {
        self.cols
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| CollateError::MissingColumn(name.to_owned()))
    }

    /// Look up a column by name, mutably.
    pub fn column_mut(&mut self, name: &str) -> Result<&mut Column, CollateError> {
        self.cols
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| CollateError::MissingColumn(name.to_owned()))
    }

    /// Borrow a scalar float column as a slice.
    pub fn f64s(&self, name: &str) -> Result<&[f64], CollateError> {
        match self.column(name)? {
            Column::F64(v) => Ok(v),
            other => Err(not_that_kind(name, "scalar float64", other)),
        }
    }

    /// Borrow a scalar float column as a mutable slice.
    pub fn f64s_mut(&mut self, name: &str) -> Result<&mut [f64], CollateError> {
        match self.column_mut(name)? {
            Column::F64(v) => Ok(v),
            other => {
                let err = not_that_kind(name, "scalar float64", other);
                Err(err)
            }
        }
    }

    /// Borrow a scalar 64-bit integer column as a slice.
    pub fn i64s(&self, name: &str) -> Result<&[i64], CollateError> {
        match self.column(name)? {
            Column::I64(v) => Ok(v),
            other => Err(not_that_kind(name, "scalar int64", other)),
        }
    }

    /// Pull a scalar value vector out of a column according to an element
    /// descriptor: the whole column, one vector element, or one matrix
    /// element.
    pub fn extract(&self, name: &str, elem: Elem) -> Result<Values, CollateError> {
        let col = self.column(name)?;

        match (col, elem) {
            (Column::I32(v), Elem::Whole) => {
                Ok(Values::Int(v.iter().map(|&x| x as i64).collect()))
            }

            (Column::I64(v), Elem::Whole) => Ok(Values::Int(v.clone())),

            (Column::F64(v), Elem::Whole) => Ok(Values::Float(v.clone())),

            (Column::VecI32(a), Elem::Index(i)) if i < a.ncols() => {
                Ok(Values::Int(a.column(i).iter().map(|&x| x as i64).collect()))
            }

            (Column::VecF64(a), Elem::Index(i)) if i < a.ncols() => {
                Ok(Values::Float(a.column(i).to_vec()))
            }

            (Column::MatF64(a), Elem::Matrix(i, j)) if i < a.shape()[1] && j < a.shape()[2] => {
                Ok(Values::Float(a.slice(s![.., i, j]).to_vec()))
            }

            (col, elem) => Err(CollateError::BadExtraction {
                column: name.to_owned(),
                detail: format!("descriptor {:?} does not fit a {} column", elem, col.kind()),
            }),
        }
    }

    /// Store a value vector into a scalar column, casting to the column's
    /// storage type.
    pub fn assign(&mut self, name: &str, values: Values) -> Result<(), CollateError> {
        let nrows = self.nrows();

        if values.len() != nrows {
            return Err(CollateError::BadExtraction {
                column: name.to_owned(),
                detail: format!("assigning {} values to {} rows", values.len(), nrows),
            });
        }

        match (self.column_mut(name)?, values) {
            (Column::I32(dst), Values::Int(src)) => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = s as i32;
                }
            }

            (Column::I32(dst), Values::Float(src)) => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = s as i32;
                }
            }

            (Column::I64(dst), Values::Int(src)) => {
                dst.copy_from_slice(&src);
            }

            (Column::I64(dst), Values::Float(src)) => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = s as i64;
                }
            }

            (Column::F64(dst), Values::Int(src)) => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = s as f64;
                }
            }

            (Column::F64(dst), Values::Float(src)) => {
                dst.copy_from_slice(&src);
            }

            (col, _) => {
                return Err(CollateError::BadExtraction {
                    column: name.to_owned(),
                    detail: format!("a {} column is not scalar-assignable", col.kind()),
                });
            }
        }

        Ok(())
    }
}

fn not_that_kind(name: &str, wanted: &str, found: &Column) -> CollateError {
    CollateError::BadExtraction {
        column: name.to_owned(),
        detail: format!("expected a {} column, found {}", wanted, found.kind()),
    }
}
