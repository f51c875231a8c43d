//! Trigger Reader: `SERVICE_CONFIG_TRIGGER_INFO`

use svcscope_core::decode::{decode_trigger_data, format_guid, nil_guid};
use svcscope_core::models::{
    ServiceTrigger, TriggerAction, TriggerDataItem, TriggerDataType, TriggerType,
};
use svcscope_core::ScmResult;
use windows::core::GUID;
use windows::Win32::System::Services::{
    SERVICE_CONFIG_TRIGGER_INFO, SERVICE_TRIGGER, SERVICE_TRIGGER_INFO,
    SERVICE_TRIGGER_SPECIFIC_DATA_ITEM,
};

use crate::configuration::query_config2;
use crate::handles::ScHandle;

/// Read the triggers of an open service (needs `SERVICE_QUERY_CONFIG`).
/// A service with no triggers yields an empty list.
pub fn query_triggers(service: &ScHandle, name: &str, max_bytes: usize) -> ScmResult<Vec<ServiceTrigger>> {
    let buffer = query_config2(service, name, SERVICE_CONFIG_TRIGGER_INFO, max_bytes)?;
    if buffer.len() < std::mem::size_of::<SERVICE_TRIGGER_INFO>() {
        return Ok(Vec::new());
    }

    // every pointer below refers into `buffer`, which outlives this block
    let triggers = unsafe {
        let info = &*buffer.as_ptr::<SERVICE_TRIGGER_INFO>();
        raw_slice(info.pTriggers, info.cTriggers)
            .iter()
            .map(|trigger| convert_trigger(trigger))
            .collect()
    };

    Ok(triggers)
}

unsafe fn convert_trigger(trigger: &SERVICE_TRIGGER) -> ServiceTrigger {
    let guid = if trigger.pTriggerSubtype.is_null() {
        nil_guid()
    } else {
        let GUID {
            data1,
            data2,
            data3,
            data4,
        } = *trigger.pTriggerSubtype;
        format_guid(data1, data2, data3, data4)
    };

    let data_items = raw_slice(trigger.pDataItems, trigger.cDataItems)
        .iter()
        .map(|item| convert_data_item(item))
        .collect();

    ServiceTrigger {
        trigger_type: TriggerType::from(trigger.dwTriggerType.0),
        action: TriggerAction::from(trigger.dwAction.0),
        guid,
        data_items,
    }
}

unsafe fn convert_data_item(item: &SERVICE_TRIGGER_SPECIFIC_DATA_ITEM) -> TriggerDataItem {
    let data_type = TriggerDataType::from(item.dwDataType.0);
    let bytes = raw_slice(item.pData as *const u8, item.cbData);
    TriggerDataItem {
        data_type,
        data: decode_trigger_data(data_type, bytes),
    }
}

/// View a native (pointer, count) pair as a slice; null yields an empty slice
unsafe fn raw_slice<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if ptr.is_null() || count == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::{open_manager, open_service};
    use svcscope_core::buffer::DEFAULT_MAX_BUFFER;
    use windows::Win32::System::Services::{SC_MANAGER_CONNECT, SERVICE_QUERY_CONFIG};

    #[test]
    fn test_read_triggers() {
        let scm = open_manager("", SC_MANAGER_CONNECT).expect("Should open SCM");
        // W32Time is trigger-started on most installations, but not all
        let svc = open_service(&scm, "W32Time", SERVICE_QUERY_CONFIG).expect("Should open W32Time");
        let triggers = query_triggers(&svc, "W32Time", DEFAULT_MAX_BUFFER).expect("Should read triggers");

        for trigger in &triggers {
            assert!(trigger.guid.starts_with('{') && trigger.guid.ends_with('}'));
            assert_eq!(trigger.guid.len(), 38);
            println!("  {} {} {}", trigger.action, trigger.trigger_type, trigger.guid);
        }
    }
}
