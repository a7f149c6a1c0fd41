//! Limits and constraints for input processing
//!
//! This module defines limits that bound the three input blobs and the
//! trees parsed from them, so that analysis work stays proportional to
//! structural input size.

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum size of any single input blob in bytes
    pub max_input_size: usize,

    /// Maximum element nesting depth
    pub max_tree_depth: usize,

    /// Maximum number of attributes per element
    pub max_attributes: usize,

    /// Maximum number of templates in a stylesheet
    pub max_templates: usize,

    /// Maximum number of productions in a grammar
    pub max_productions: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_size: 10 * 1024 * 1024, // 10 MB
            max_tree_depth: 200,
            max_attributes: 256,
            max_templates: 1024,
            max_productions: 4096,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_input_size: 1024 * 1024, // 1 MB
            max_tree_depth: 50,
            max_attributes: 32,
            max_templates: 128,
            max_productions: 512,
        }
    }

    /// Check that an input blob is within the size limit
    pub fn check_input_size(&self, size: usize) -> Result<()> {
        if size > self.max_input_size {
            Err(Error::LimitExceeded(format!(
                "input size {} bytes exceeds maximum {} bytes",
                size, self.max_input_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check that element nesting is within the depth limit
    pub fn check_tree_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_tree_depth {
            Err(Error::LimitExceeded(format!(
                "tree depth {} exceeds maximum {}",
                depth, self.max_tree_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check that an element's attribute count is within limits
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        if count > self.max_attributes {
            Err(Error::LimitExceeded(format!(
                "attribute count {} exceeds maximum {}",
                count, self.max_attributes
            )))
        } else {
            Ok(())
        }
    }

    /// Check that a stylesheet's template count is within limits
    pub fn check_templates(&self, count: usize) -> Result<()> {
        if count > self.max_templates {
            Err(Error::LimitExceeded(format!(
                "template count {} exceeds maximum {}",
                count, self.max_templates
            )))
        } else {
            Ok(())
        }
    }

    /// Check that a grammar's production count is within limits
    pub fn check_productions(&self, count: usize) -> Result<()> {
        if count > self.max_productions {
            Err(Error::LimitExceeded(format!(
                "production count {} exceeds maximum {}",
                count, self.max_productions
            )))
        } else {
            Ok(())
        }
    }
}
