#![allow(missing_docs)]

use core::fmt;
use std::error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    StateCapacityExceeded {
        capacity: usize,
    },
    TextureCapacityExceeded {
        capacity: usize,
    },
    ShaderCapacityExceeded {
        capacity: usize,
    },
    ConditionCapacityExceeded {
        capacity: usize,
    },
    ShaderCompile {
        vertex: String,
        fragment: String,
        message: String,
    },
    UnknownStateIndex(usize),
    UnknownProgram(usize),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::StateCapacityExceeded { capacity } => {
                write!(f, "render state limit of {} exceeded", capacity)
            }
            StateError::TextureCapacityExceeded { capacity } => {
                write!(f, "texture state limit of {} exceeded", capacity)
            }
            StateError::ShaderCapacityExceeded { capacity } => {
                write!(f, "shader program limit of {} exceeded", capacity)
            }
            StateError::ConditionCapacityExceeded { capacity } => {
                write!(f, "material condition limit of {} exceeded", capacity)
            }
            StateError::ShaderCompile {
                vertex,
                fragment,
                message,
            } => write!(
                f,
                "failed to compile program ({}, {}): {}",
                vertex, fragment, message
            ),
            StateError::UnknownStateIndex(index) => write!(f, "unknown render state: {}", index),
            StateError::UnknownProgram(index) => write!(f, "unknown shader program: {}", index),
        }
    }
}

impl error::Error for StateError {}
