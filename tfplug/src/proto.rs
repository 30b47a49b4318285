//! Generated tfplugin6 protocol types

#![allow(clippy::all)]

tonic::include_proto!("tfplugin6");
