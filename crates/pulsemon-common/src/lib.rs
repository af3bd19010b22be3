pub mod crypto;
pub mod envelope;
pub mod hash;
pub mod model;
pub mod netutil;

pub mod proto {
    #![allow(clippy::pedantic)]
    #![allow(clippy::missing_errors_doc)]
    #![allow(clippy::doc_markdown)]
    #![allow(clippy::default_trait_access)]
    tonic::include_proto!("pulsemon");
}
