use tokio::runtime::Handle;

use crate::{
    ClientError, InvalidQuery, QueryDescriptor, QueryExecutionError, Response, StreamingCompletion,
    StreamingResponse, Transport, execute::execute, streaming,
};

pub const DEFAULT_PREFETCH_BATCHES: usize = 2;

/// Entry point for running 2i queries over a [`Transport`].
pub struct Client<T> {
    transport: T,
    runtime: Handle,
    prefetch: usize,
}

impl<T: Transport> Client<T> {
    pub fn builder(transport: T) -> ClientBuilder<T> {
        ClientBuilder::new(transport)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn default_prefetch(&self) -> usize {
        self.prefetch
    }

    /// Fetch every page of `query` and return all the entries at once.
    pub async fn execute(
        &self,
        query: &QueryDescriptor,
    ) -> Result<Response, QueryExecutionError<T::Error>> {
        execute(&self.transport, query).await
    }

    /// Start fetching `query` in the background, keeping up to `prefetch` pages ahead of the
    /// consumer.
    #[allow(clippy::type_complexity)] // Pair of handles, nothing to name here
    pub fn execute_streaming(
        &self,
        query: &QueryDescriptor,
        prefetch: usize,
    ) -> Result<(StreamingResponse<T::Error>, StreamingCompletion<T::Error>), InvalidQuery> {
        streaming::start(&self.runtime, self.transport.clone(), query, prefetch)
    }

    /// [`Client::execute_streaming`] with the configured prefetch.
    #[allow(clippy::type_complexity)]
    pub fn stream(
        &self,
        query: &QueryDescriptor,
    ) -> Result<(StreamingResponse<T::Error>, StreamingCompletion<T::Error>), InvalidQuery> {
        self.execute_streaming(query, self.prefetch)
    }
}

pub struct ClientBuilder<T> {
    transport: T,
    runtime: Option<Handle>,
    prefetch: usize,
}

impl<T: Transport> ClientBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            runtime: None,
            prefetch: DEFAULT_PREFETCH_BATCHES,
        }
    }

    /// Runtime hosting the background fetch of streaming queries. Defaults to the runtime
    /// `build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn prefetch(mut self, prefetch: usize) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn build(self) -> Result<Client<T>, ClientError> {
        if self.prefetch == 0 {
            return Err(ClientError::ZeroPrefetch);
        }
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| ClientError::NoRuntime)?,
        };
        Ok(Client {
            transport: self.transport,
            runtime,
            prefetch: self.prefetch,
        })
    }
}
