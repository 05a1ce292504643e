use super::schema::events_schema;
use super::EventRecord;
use arrow::array::{
    Date32Builder, StringBuilder, StringDictionaryBuilder, TimestampMicrosecondBuilder,
};
use arrow::datatypes::Int8Type;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

pub struct EventsBuffer {
    date: Date32Builder,
    timestamp: TimestampMicrosecondBuilder,
    container_id: StringBuilder,
    name: StringBuilder,
    action: StringBuilder,
    status: StringDictionaryBuilder<Int8Type>,
    image: StringBuilder,
}

impl EventsBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            date: Date32Builder::with_capacity(capacity),
            timestamp: TimestampMicrosecondBuilder::with_capacity(capacity),
            container_id: StringBuilder::with_capacity(capacity, capacity * 64),
            name: StringBuilder::with_capacity(capacity, capacity * 20),
            action: StringBuilder::with_capacity(capacity, capacity * 10),
            status: StringDictionaryBuilder::new(),
            image: StringBuilder::with_capacity(capacity, capacity * 50),
        }
    }

    pub fn push(&mut self, record: &EventRecord) {
        let date_days = record.timestamp.div_euclid(86400 * 1_000_000) as i32;

        self.date.append_value(date_days);
        self.timestamp.append_value(record.timestamp);
        self.container_id.append_value(&record.container_id);
        self.name.append_value(&record.name);
        self.action.append_value(&record.action);
        self.status.append_value(&record.status);

        match &record.image {
            Some(image) => self.image.append_value(image),
            None => self.image.append_null(),
        }
    }

    pub fn into_record_batch(mut self) -> arrow::error::Result<RecordBatch> {
        RecordBatch::try_new(
            events_schema(),
            vec![
                Arc::new(self.date.finish()),
                Arc::new(self.timestamp.finish().with_timezone("UTC")),
                Arc::new(self.container_id.finish()),
                Arc::new(self.name.finish()),
                Arc::new(self.action.finish()),
                Arc::new(self.status.finish()),
                Arc::new(self.image.finish()),
            ],
        )
    }
}
