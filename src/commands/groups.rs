/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file groups.rs
 * @brief Command catalogue, one table per functional group
 */

use super::definition::{CommandBehavior as B, CommandDefinition as C};

pub static AGGREGATION: &[C] = &[
    C::unimplemented("aggregate"),
    C::new("count", B::Count),
    C::unimplemented("distinct"),
    C::unimplemented("group"),
    C::unimplemented("mapReduce"),
];

pub static GEOSPATIAL: &[C] = &[
    C::unimplemented("geoNear"),
    C::unimplemented("geoSearch"),
    C::unimplemented("geoWalk"),
];

pub static QUERY_AND_WRITE_OPERATIONS: &[C] = &[
    C::new("delete", B::Delete),
    C::unimplemented("eval"),
    C::unimplemented("findAndModify"),
    C::new("getLastError", B::GetLastError),
    C::unimplemented("getPrevError"),
    C::new("insert", B::Insert),
    C::unimplemented("parallelCollectionScan"),
    C::unimplemented("resetError"),
    C::unimplemented("text"),
    C::new("update", B::Update),
];

pub static AUTHENTICATION: &[C] = &[
    C::unimplemented("logout"),
    C::unimplemented("authenticate"),
    C::unimplemented("copydbgetnonce").admin_only(),
    C::new("getnonce", B::GetNonce),
    C::unimplemented("authSchemaUpgrade").admin_only(),
];

pub static USER_MANAGEMENT: &[C] = &[
    C::unimplemented("createUser"),
    C::unimplemented("updateUser"),
    C::unimplemented("dropUser"),
    C::unimplemented("dropAllUsersFromDatabase"),
    C::unimplemented("grantRolesToUser"),
    C::unimplemented("revokeRolesFromUser"),
    C::unimplemented("usersInfo"),
];

pub static ROLE_MANAGEMENT: &[C] = &[
    C::unimplemented("createRole"),
    C::unimplemented("updateRole"),
    C::unimplemented("dropRole"),
    C::unimplemented("dropAllRolesFromDatabase"),
    C::unimplemented("grantPrivilegesToRole"),
    C::unimplemented("revokePrivilegesFromRole"),
    C::unimplemented("grantRolesToRole"),
    C::unimplemented("revokeRolesFromRole"),
    C::unimplemented("rolesInfo"),
    C::unimplemented("invalidateUserCache").admin_only(),
];

pub static REPLICATION: &[C] = &[
    C::unimplemented("replSetFreeze").admin_only(),
    C::new("replSetGetStatus", B::ReplSetGetStatus).admin_only(),
    C::unimplemented("replSetInitiate").admin_only(),
    C::unimplemented("replSetMaintenance").admin_only(),
    C::unimplemented("replSetReconfig").admin_only(),
    C::unimplemented("replSetStepDown").admin_only(),
    C::unimplemented("replSetSyncFrom").admin_only(),
    C::unimplemented("resync").admin_only(),
    C::unimplemented("applyOps"),
    C::new("isMaster", B::IsMaster),
    C::unimplemented("getoptime"),
];

pub static SHARDING: &[C] = &[
    C::unimplemented("flushRouterConfig").admin_only(),
    C::unimplemented("addShard").admin_only(),
    C::unimplemented("cleanupOrphaned").admin_only(),
    C::unimplemented("checkShardingIndex"),
    C::unimplemented("enableSharding").admin_only(),
    C::unimplemented("listShards").admin_only(),
    C::unimplemented("removeShard").admin_only(),
    C::unimplemented("getShardMap").admin_only(),
    C::unimplemented("getShardVersion").admin_only(),
    C::unimplemented("mergeChunks").admin_only(),
    C::unimplemented("setShardVersion").admin_only(),
    C::unimplemented("shardCollection").admin_only(),
    C::unimplemented("shardingState").admin_only(),
    C::unimplemented("unsetSharding").admin_only(),
    C::unimplemented("split").admin_only(),
    C::unimplemented("splitChunk").admin_only(),
    C::unimplemented("splitVector"),
    C::unimplemented("medianKey"),
    C::unimplemented("moveChunk").admin_only(),
    C::unimplemented("movePrimary").admin_only(),
    C::unimplemented("isdbgrid"),
];

pub static ADMINISTRATION: &[C] = &[
    C::unimplemented("renameCollection").admin_only(),
    C::unimplemented("copydb").admin_only(),
    C::unimplemented("dropDatabase"),
    C::new("listCollections", B::ListCollections),
    C::new("drop", B::Drop),
    C::new("create", B::Create),
    C::unimplemented("clone"),
    C::unimplemented("cloneCollection"),
    C::unimplemented("cloneCollectionAsCapped"),
    C::unimplemented("closeAllDatabases").admin_only(),
    C::unimplemented("convertToCapped"),
    C::unimplemented("filemd5"),
    C::new("createIndexes", B::CreateIndexes),
    C::new("listIndexes", B::ListIndexes),
    C::new("dropIndexes", B::DeleteIndexes),
    C::new("deleteIndexes", B::DeleteIndexes),
    C::unimplemented("fsync").admin_only(),
    C::unimplemented("clean"),
    C::unimplemented("connPoolSync"),
    C::unimplemented("connectionStatus"),
    C::unimplemented("collMod"),
    C::unimplemented("reIndex"),
    C::unimplemented("setParameter").admin_only(),
    C::unimplemented("getParameter").admin_only(),
    C::unimplemented("repairDatabase"),
    C::unimplemented("repairCursor"),
    C::unimplemented("touch"),
    C::unimplemented("shutdown").admin_only(),
    C::unimplemented("logRotate").admin_only(),
    C::unimplemented("compact"),
];

pub static DIAGNOSTIC: &[C] = &[
    C::new("listDatabases", B::ListDatabases).admin_only(),
    C::unimplemented("dbHash"),
    C::unimplemented("driverOIDTest"),
    C::unimplemented("listCommands"),
    C::unimplemented("availableQueryOptions"),
    C::new("buildInfo", B::BuildInfo),
    C::new("collStats", B::CollStats),
    C::unimplemented("connPoolStats"),
    C::unimplemented("shardConnPoolStats"),
    C::unimplemented("dbStats"),
    C::unimplemented("cursorInfo"),
    C::unimplemented("dataSize"),
    C::unimplemented("diagLogging").admin_only(),
    C::unimplemented("explain"),
    C::unimplemented("features"),
    C::unimplemented("getCmdLineOpts").admin_only(),
    C::new("getLog", B::GetLog).admin_only(),
    C::unimplemented("hostInfo"),
    C::unimplemented("indexStats"),
    C::unimplemented("isSelf"),
    C::new("ping", B::Ping),
    C::unimplemented("profile"),
    C::unimplemented("serverStatus"),
    C::unimplemented("top").admin_only(),
    C::new("validate", B::Validate),
    C::new("whatsmyuri", B::WhatsMyUri),
    C::unimplemented("netstat").admin_only(),
];

pub static INTERNAL: &[C] = &[
    C::unimplemented("handshake"),
    C::unimplemented("_recvChunkAbort"),
    C::unimplemented("_recvChunkCommit"),
    C::unimplemented("_recvChunkStart"),
    C::unimplemented("_recvChunkStatus"),
    C::unimplemented("_replSetFresh"),
    C::unimplemented("mapreduce.shardedfinish"),
    C::unimplemented("_transferMods"),
    C::unimplemented("replSetHeartbeat"),
    C::unimplemented("replSetGetRBID"),
    C::unimplemented("_migrateClone"),
    C::unimplemented("replSetElect"),
    C::unimplemented("writeBacksQueued"),
    C::unimplemented("writebacklisten"),
];

pub static TESTING: &[C] = &[
    C::unimplemented("testDistLockWithSkew"),
    C::unimplemented("testDistLockWithSyncCluster"),
    C::unimplemented("captrunc"),
    C::unimplemented("emptycapped"),
    C::unimplemented("godinsert"),
    C::unimplemented("_hashBSONElement"),
    C::unimplemented("journalLatencyTest"),
    C::unimplemented("sleep"),
    C::unimplemented("replSetTest"),
    C::unimplemented("forceerror"),
    C::unimplemented("skewClockCommand"),
    C::unimplemented("configureFailPoint"),
];

pub static SYSTEM_EVENTS_AUDITING: &[C] = &[C::unimplemented("logApplicationMessage")];
