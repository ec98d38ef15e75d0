// A watched client module that reaches the network through adapter layers

use crate::adapters::through_layers;
use httpwatch::http::{HttpResponse, TransportError};
use httpwatch::targets::Session;

pub struct ServerManager<'a> {
    session: &'a Session,
}

impl<'a> ServerManager<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    #[inline(never)]
    pub fn list(&self, url: &str, layers: usize) -> Result<HttpResponse, TransportError> {
        through_layers(layers, &|| self.session.get(url))
    }
}
