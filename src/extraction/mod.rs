/*!
 * The submission & quota unit: file validation, the OCR webhook call,
 * multi-shape response normalization, extraction-quota accounting and the
 * controller that sequences them.
 */

pub mod controller;
pub mod normalize;
pub mod quota;
pub mod submission;
pub mod validator;
