//! Text renderings of a `LinearModel`.
//!
//! `summary` is meant for people (fixed-point, narrow columns);
//! `scicos_script` is a Scilab/Scicos script defining the operating point and
//! a continuous `syslin` system, in scientific notation.

use std::fmt::Write;

use nalgebra::{DMatrix, DVector};

use crate::linearization::{LinearModel, VariableInfo};

const SUMMARY_WIDTH: usize = 10;
const SUMMARY_PRECISION: usize = 3;
const SCRIPT_WIDTH: usize = 20;
const SCRIPT_PRECISION: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberStyle {
    Fixed,
    Scientific,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub style: NumberStyle,
    pub width: usize,
    pub precision: usize,
}

impl NumberFormat {
    pub fn fixed(width: usize, precision: usize) -> Self {
        Self {
            style: NumberStyle::Fixed,
            width,
            precision,
        }
    }

    pub fn scientific(width: usize, precision: usize) -> Self {
        Self {
            style: NumberStyle::Scientific,
            width,
            precision,
        }
    }

    fn write(&self, out: &mut String, value: f64, width: usize) {
        let precision = self.precision;
        // Writing into a String cannot fail.
        let _ = match self.style {
            NumberStyle::Fixed => write!(out, "{value:>width$.precision$}"),
            NumberStyle::Scientific => write!(out, "{value:>width$.precision$e}"),
        };
    }
}

/// `[a, b;\n c, d]`: columns separated by `,`, rows by `;` and a newline.
/// The first entry is one character narrower to make room for the bracket.
pub fn format_matrix(matrix: &DMatrix<f64>, format: NumberFormat) -> String {
    if matrix.is_empty() {
        return "[]".to_string();
    }
    let mut out = String::from("[");
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            let width = if i == 0 && j == 0 {
                format.width.saturating_sub(1)
            } else {
                format.width
            };
            format.write(&mut out, matrix[(i, j)], width);
            if j + 1 < matrix.ncols() {
                out.push(',');
            } else if i + 1 < matrix.nrows() {
                out.push_str(";\n");
            } else {
                out.push(']');
            }
        }
    }
    out
}

/// Column vector, one entry per row.
pub fn format_vector(vector: &DVector<f64>, format: NumberFormat) -> String {
    let column = DMatrix::from_column_slice(vector.len(), 1, vector.as_slice());
    format_matrix(&column, format)
}

fn write_table(out: &mut String, title: &str, infos: &[VariableInfo], values: &DVector<f64>) {
    let _ = writeln!(out, "{title}:");
    for (info, value) in infos.iter().zip(values.iter()) {
        let _ = writeln!(
            out,
            "\t{}\t{}\t:\t{value:>w$.p$}",
            info.name,
            info.unit,
            w = SUMMARY_WIDTH,
            p = SUMMARY_PRECISION
        );
    }
}

/// Human-readable report: operating point, matrices and open-loop eigenvalues.
pub fn summary(model: &LinearModel) -> String {
    let format = NumberFormat::fixed(SUMMARY_WIDTH, SUMMARY_PRECISION);
    let point = &model.operating_point;
    let mut out = String::new();

    write_table(&mut out, "X", &model.states, &point.x0);
    out.push('\n');
    write_table(&mut out, "U", &model.inputs, &point.u0);
    out.push('\n');
    write_table(&mut out, "Y", &model.outputs, &point.y0);

    let _ = write!(
        out,
        "\nA=\n{}\nB=\n{}\nC=\n{}\n* note: C should be identity, if not, indicates problem with model\nD=\n{}\n",
        format_matrix(&model.a, format),
        format_matrix(&model.b, format),
        format_matrix(&model.c, format),
        format_matrix(&model.d, format),
    );

    let eigenvalues = model.eigenvalues();
    if !eigenvalues.is_empty() {
        out.push_str("\neigenvalues(A):\n");
        for lambda in eigenvalues {
            let sign = if lambda.im < 0.0 { '-' } else { '+' };
            let _ = writeln!(
                out,
                "\t{:>w$.p$} {} {:.p$}i",
                lambda.re,
                sign,
                lambda.im.abs(),
                w = SUMMARY_WIDTH,
                p = SUMMARY_PRECISION
            );
        }
    }
    out
}

/// Scilab script binding `<name>.x0`, `<name>.u0`, `<name>.sys` and
/// `<name>.tfm`.
pub fn scicos_script(name: &str, model: &LinearModel) -> String {
    let format = NumberFormat::scientific(SCRIPT_WIDTH, SCRIPT_PRECISION);
    let point = &model.operating_point;
    format!(
        "{name}.x0=..\n{x0};\n\
         {name}.u0=..\n{u0};\n\
         {name}.sys = syslin('c',..\n{a},..\n{b},..\n{c},..\n{d});\n\
         {name}.tfm = ss2tf({name}.sys);\n",
        x0 = format_vector(&point.x0, format),
        u0 = format_vector(&point.u0, format),
        a = format_matrix(&model.a, format),
        b = format_matrix(&model.b, format),
        c = format_matrix(&model.c, format),
        d = format_matrix(&model.d, format),
    )
}

/// File name conventionally used for `scicos_script` output.
pub fn script_file_name(name: &str) -> String {
    format!("{name}_lin.sce")
}
